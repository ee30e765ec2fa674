mod client;
mod envelope;

pub use client::{
    CabinetClient, CabinetError, FileContent, FileRecord, FolderRecord, FolderRef, Passport,
    UploadReceipt,
};
