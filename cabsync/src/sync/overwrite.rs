use std::io;
use std::io::Write;

/// What to do when a downloaded file already exists locally. `Prompt`
/// blocks on terminal input, so automated runs inject one of the
/// deterministic policies instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    Always,
    Never,
    Prompt,
}

impl OverwritePolicy {
    pub fn allows_overwrite(&self, file_name: &str) -> io::Result<bool> {
        match self {
            OverwritePolicy::Always => Ok(true),
            OverwritePolicy::Never => Ok(false),
            OverwritePolicy::Prompt => {
                confirm(&format!("File {file_name} already exists. Overwrite?"))
            }
        }
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N]: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policies_answer_without_input() {
        assert!(OverwritePolicy::Always.allows_overwrite("x.js").unwrap());
        assert!(!OverwritePolicy::Never.allows_overwrite("x.js").unwrap());
    }
}
