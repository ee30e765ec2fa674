use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::client::{CabinetError, FileRecord, FolderRecord, FolderRef, Passport, UploadReceipt};

// ── Request building ─────────────────────────────────────────────────────────

pub(crate) fn envelope(passport: &Passport, body: &str) -> String {
    let role = passport
        .role
        .as_deref()
        .map(|role| format!("\n      <role internalId=\"{}\"/>", escape(role)))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Header>
    <passport>
      <email>{email}</email>
      <password>{password}</password>
      <account>{account}</account>{role}
    </passport>
  </soapenv:Header>
  <soapenv:Body>
{body}
  </soapenv:Body>
</soapenv:Envelope>"#,
        email = escape(&passport.email),
        password = escape(&passport.password),
        account = escape(&passport.account),
    )
}

/// Folder search criteria. With no parent ids the search is scoped to the
/// top level of the cabinet; the service's own name matching is exact-case.
pub(crate) fn folder_search_body(name: Option<&str>, parent_ids: &[String]) -> String {
    let mut criteria = String::new();
    if let Some(name) = name {
        criteria.push_str(&format!(
            "        <name operator=\"is\">{}</name>\n",
            escape(name)
        ));
    }
    if parent_ids.is_empty() {
        criteria.push_str("        <isTopLevel>true</isTopLevel>\n");
    } else {
        for id in parent_ids {
            criteria.push_str(&format!("        <parent internalId=\"{}\"/>\n", escape(id)));
        }
    }
    format!(
        "    <search>\n      <searchRecord type=\"folder\">\n{criteria}      </searchRecord>\n    </search>"
    )
}

pub(crate) fn file_search_body(folder_id: &str) -> String {
    format!(
        "    <search>\n      <searchRecord type=\"file\">\n        <folder internalId=\"{}\"/>\n      </searchRecord>\n    </search>",
        escape(folder_id)
    )
}

pub(crate) fn get_file_body(file_id: &str) -> String {
    format!(
        "    <get>\n      <baseRef internalId=\"{}\" type=\"file\"/>\n    </get>",
        escape(file_id)
    )
}

pub(crate) fn add_file_body(
    name: &str,
    description: Option<&str>,
    folder_id: &str,
    content_base64: &str,
) -> String {
    let description = description
        .map(|text| format!("        <description>{}</description>\n", escape(text)))
        .unwrap_or_default();
    format!(
        "    <add>\n      <record type=\"file\">\n        <name>{name}</name>\n        <content>{content}</content>\n        <folder internalId=\"{folder}\"/>\n{description}      </record>\n    </add>",
        name = escape(name),
        content = content_base64,
        folder = escape(folder_id),
    )
}

// ── Response parsing ─────────────────────────────────────────────────────────
//
// Namespace prefixes vary between service versions, so every tag is matched
// on its local name only.

fn local_name(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    raw.rsplit(':').next().unwrap_or(&raw).to_string()
}

fn attr(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, CabinetError> {
    for attr in start.attributes().flatten() {
        if local_name(attr.key.as_ref()) == name {
            let value = attr.unescape_value()?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Rejects faulted envelopes and unsuccessful operation statuses before any
/// record extraction happens. The raw fault/status detail is preserved in
/// the error.
pub(crate) fn check_response(xml: &str) -> Result<(), CabinetError> {
    let mut reader = Reader::from_str(xml);
    let mut capture: Option<String> = None;
    let mut in_fault = false;
    let mut in_status_detail = false;
    let mut fault_code = String::new();
    let mut fault_detail = String::new();
    let mut detail_parts: Vec<String> = Vec::new();
    let mut success: Option<bool> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()).as_str() {
                "Fault" => in_fault = true,
                tag @ ("faultcode" | "faultstring") if in_fault => capture = Some(tag.to_string()),
                "status" => {
                    if let Some(value) = attr(&e, "isSuccess")? {
                        success = Some(value == "true");
                    }
                }
                "statusDetail" => in_status_detail = true,
                tag @ ("code" | "message") if in_status_detail => capture = Some(tag.to_string()),
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == "status"
                    && let Some(value) = attr(&e, "isSuccess")?
                {
                    success = Some(value == "true");
                }
            }
            Event::Text(e) => {
                if let Some(tag) = capture.as_deref() {
                    let text = e.unescape()?.trim().to_string();
                    if !text.is_empty() {
                        match tag {
                            "faultcode" => fault_code = text,
                            "faultstring" => fault_detail = text,
                            _ => detail_parts.push(text),
                        }
                    }
                }
            }
            Event::End(e) => {
                match local_name(e.name().as_ref()).as_str() {
                    "Fault" => in_fault = false,
                    "statusDetail" => in_status_detail = false,
                    _ => {}
                }
                capture = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if in_fault || !fault_code.is_empty() || !fault_detail.is_empty() {
        return Err(CabinetError::Fault {
            code: if fault_code.is_empty() {
                "unknown".to_string()
            } else {
                fault_code
            },
            detail: fault_detail,
        });
    }
    match success {
        Some(true) => Ok(()),
        Some(false) => Err(CabinetError::Unsuccessful {
            detail: if detail_parts.is_empty() {
                "no status detail".to_string()
            } else {
                detail_parts.join(": ")
            },
        }),
        None => Err(CabinetError::MissingField("status")),
    }
}

/// Extracts folder records from a search response. The wire collapses a
/// one-element record list to a single record element; both shapes land
/// here identically.
pub(crate) fn parse_folder_records(xml: &str) -> Result<Vec<FolderRecord>, CabinetError> {
    check_response(xml)?;

    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut current: Option<FolderRecord> = None;
    let mut in_parent = false;
    let mut capture_name = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()).as_str() {
                "record" => {
                    current = Some(FolderRecord {
                        internal_id: attr(&e, "internalId")?
                            .ok_or(CabinetError::MissingField("record internalId"))?,
                        name: String::new(),
                        parent_id: None,
                    });
                }
                "parent" if current.is_some() => {
                    in_parent = true;
                    if let Some(id) = attr(&e, "internalId")?
                        && let Some(record) = current.as_mut()
                    {
                        record.parent_id = Some(id);
                    }
                }
                "name" if current.is_some() && !in_parent => capture_name = true,
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == "parent"
                    && let Some(id) = attr(&e, "internalId")?
                    && let Some(record) = current.as_mut()
                {
                    record.parent_id = Some(id);
                }
            }
            Event::Text(e) => {
                if capture_name && let Some(record) = current.as_mut() {
                    record.name = e.unescape()?.trim().to_string();
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()).as_str() {
                "record" => {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                "parent" => in_parent = false,
                "name" => capture_name = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

pub(crate) fn parse_file_records(xml: &str) -> Result<Vec<FileRecord>, CabinetError> {
    check_response(xml)?;

    struct Partial {
        internal_id: String,
        name: String,
        folder_id: Option<String>,
        folder_name: String,
    }

    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut current: Option<Partial> = None;
    let mut in_folder = false;
    let mut capture_name = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()).as_str() {
                "record" => {
                    current = Some(Partial {
                        internal_id: attr(&e, "internalId")?
                            .ok_or(CabinetError::MissingField("record internalId"))?,
                        name: String::new(),
                        folder_id: None,
                        folder_name: String::new(),
                    });
                }
                "folder" if current.is_some() => {
                    in_folder = true;
                    if let Some(id) = attr(&e, "internalId")?
                        && let Some(record) = current.as_mut()
                    {
                        record.folder_id = Some(id);
                    }
                }
                "name" if current.is_some() => capture_name = true,
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == "folder"
                    && let Some(id) = attr(&e, "internalId")?
                    && let Some(record) = current.as_mut()
                {
                    record.folder_id = Some(id);
                }
            }
            Event::Text(e) => {
                if capture_name && let Some(record) = current.as_mut() {
                    let text = e.unescape()?.trim().to_string();
                    if in_folder {
                        record.folder_name = text;
                    } else {
                        record.name = text;
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()).as_str() {
                "record" => {
                    if let Some(partial) = current.take() {
                        let folder_id = partial
                            .folder_id
                            .ok_or(CabinetError::MissingField("file folder"))?;
                        records.push(FileRecord {
                            internal_id: partial.internal_id,
                            name: partial.name,
                            folder: FolderRef {
                                internal_id: folder_id,
                                name: partial.folder_name,
                            },
                        });
                    }
                }
                "folder" => in_folder = false,
                "name" => capture_name = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Returns the file name and the raw base64 content of a read response.
pub(crate) fn parse_file_content(xml: &str) -> Result<(String, String), CabinetError> {
    check_response(xml)?;

    let mut reader = Reader::from_str(xml);
    let mut name = None;
    let mut content = None;
    let mut capture: Option<&'static str> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()).as_str() {
                "name" => capture = Some("name"),
                "content" => capture = Some("content"),
                _ => {}
            },
            Event::Text(e) => match capture {
                Some("name") => name = Some(e.unescape()?.trim().to_string()),
                Some("content") => content = Some(e.unescape()?.into_owned()),
                _ => {}
            },
            Event::End(_) => capture = None,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((
        name.ok_or(CabinetError::MissingField("file name"))?,
        content.unwrap_or_default(),
    ))
}

pub(crate) fn parse_upload_receipt(xml: &str) -> Result<UploadReceipt, CabinetError> {
    check_response(xml)?;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if local_name(e.name().as_ref()) == "baseRef"
                    && let Some(internal_id) = attr(&e, "internalId")?
                {
                    return Ok(UploadReceipt { internal_id });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Err(CabinetError::MissingField("baseRef internalId"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_envelope(result: &str) -> String {
        format!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <searchResponse>
      <platformCore:searchResult xmlns:platformCore="urn:core">
        {result}
      </platformCore:searchResult>
    </searchResponse>
  </soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    #[test]
    fn parses_folder_record_list() {
        let xml = search_envelope(
            r#"<platformCore:status isSuccess="true"/>
        <platformCore:recordList>
          <platformCore:record internalId="12">
            <platformCore:name>Scripts</platformCore:name>
            <platformCore:parent internalId="3"/>
          </platformCore:record>
          <platformCore:record internalId="13">
            <platformCore:name>Templates</platformCore:name>
          </platformCore:record>
        </platformCore:recordList>"#,
        );

        let records = parse_folder_records(&xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].internal_id, "12");
        assert_eq!(records[0].name, "Scripts");
        assert_eq!(records[0].parent_id.as_deref(), Some("3"));
        assert_eq!(records[1].internal_id, "13");
        assert_eq!(records[1].parent_id, None);
    }

    #[test]
    fn parses_single_record_without_list_wrapper() {
        // One-element results come back without an enclosing list on some
        // service versions.
        let xml = search_envelope(
            r#"<platformCore:status isSuccess="true"/>
        <platformCore:record internalId="7">
          <platformCore:name>Deploy</platformCore:name>
        </platformCore:record>"#,
        );

        let records = parse_folder_records(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].internal_id, "7");
        assert_eq!(records[0].name, "Deploy");
    }

    #[test]
    fn parses_file_record_with_composite_folder_path() {
        let xml = search_envelope(
            r#"<platformCore:status isSuccess="true"/>
        <platformCore:recordList>
          <platformCore:record internalId="41">
            <platformCore:name>x.js</platformCore:name>
            <platformCore:folder internalId="5">
              <platformCore:name>A : B</platformCore:name>
            </platformCore:folder>
          </platformCore:record>
        </platformCore:recordList>"#,
        );

        let records = parse_file_records(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "x.js");
        assert_eq!(records[0].folder.internal_id, "5");
        assert_eq!(records[0].folder.name, "A : B");
    }

    #[test]
    fn fault_surfaces_as_typed_error() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode>soapenv:Server.userException</faultcode>
      <faultstring>session timed out</faultstring>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#;

        let err = parse_folder_records(xml).unwrap_err();
        match err {
            CabinetError::Fault { code, detail } => {
                assert_eq!(code, "soapenv:Server.userException");
                assert_eq!(detail, "session timed out");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn unsuccessful_status_carries_detail() {
        let xml = search_envelope(
            r#"<platformCore:status isSuccess="false">
          <platformCore:statusDetail>
            <platformCore:code>INVALID_SEARCH</platformCore:code>
            <platformCore:message>folder criteria rejected</platformCore:message>
          </platformCore:statusDetail>
        </platformCore:status>"#,
        );

        let err = parse_folder_records(&xml).unwrap_err();
        match err {
            CabinetError::Unsuccessful { detail } => {
                assert_eq!(detail, "INVALID_SEARCH: folder criteria rejected");
            }
            other => panic!("expected unsuccessful status, got {other:?}"),
        }
    }

    #[test]
    fn missing_status_is_rejected() {
        let xml = search_envelope("<platformCore:recordList/>");
        assert!(matches!(
            parse_folder_records(&xml),
            Err(CabinetError::MissingField("status"))
        ));
    }

    #[test]
    fn folder_search_body_uses_top_level_flag_without_parents() {
        let body = folder_search_body(Some("Scripts"), &[]);
        assert!(body.contains(r#"<name operator="is">Scripts</name>"#));
        assert!(body.contains("<isTopLevel>true</isTopLevel>"));
        assert!(!body.contains("<parent"));
    }

    #[test]
    fn folder_search_body_lists_every_parent_id() {
        let parents = vec!["3".to_string(), "4".to_string()];
        let body = folder_search_body(None, &parents);
        assert!(body.contains(r#"<parent internalId="3"/>"#));
        assert!(body.contains(r#"<parent internalId="4"/>"#));
        assert!(!body.contains("<name"));
        assert!(!body.contains("isTopLevel"));
    }

    #[test]
    fn request_text_is_escaped() {
        let body = folder_search_body(Some("R&D <lab>"), &[]);
        assert!(body.contains("R&amp;D &lt;lab&gt;"));

        let passport = Passport {
            email: "dev@example.com".to_string(),
            password: "a<b&c".to_string(),
            account: "ACME".to_string(),
            role: None,
        };
        let envelope = envelope(&passport, &body);
        assert!(envelope.contains("<password>a&lt;b&amp;c</password>"));
        assert!(!envelope.contains("<role"));
    }

    #[test]
    fn upload_receipt_reads_base_ref_id() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <addResponse>
      <writeResponse>
        <platformCore:status isSuccess="true" xmlns:platformCore="urn:core"/>
        <baseRef internalId="99" type="file"/>
      </writeResponse>
    </addResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

        let receipt = parse_upload_receipt(xml).unwrap();
        assert_eq!(receipt.internal_id, "99");
    }
}
