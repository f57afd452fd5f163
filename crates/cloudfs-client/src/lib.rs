//! # CloudFS Client SDK
//!
//! An async client for a cloud file-storage REST API.
//!
//! ## Features
//!
//! - **Signed authentication**: password grant signed with HMAC-SHA1
//! - **Files and folders**: create, list, copy, move, alter metadata, delete
//! - **Transfers**: streaming upload and download with progress callbacks
//! - **Shares and trash**: share links, receive, restore
//!
//! ## Example
//!
//! ```rust,ignore
//! use cloudfs_client::{Config, Exists, RestAdapter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let adapter = RestAdapter::new(
//!         Config::new("https://files.example.com").with_client("client-id", "client-secret"),
//!     )?;
//!
//!     adapter.authenticate("alice@example.com", "password").await?;
//!
//!     // Create a folder and list the root
//!     let folder = adapter.create_folder("/", "reports", Exists::Rename).await?;
//!     for item in adapter.list_folder(None, 0, None).await? {
//!         println!("{} ({:?})", item.name, item.kind);
//!     }
//!
//!     // Upload into the new folder
//!     folder.upload("q3.pdf", "./q3.pdf".as_ref(), Exists::Overwrite, None).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod credential;
mod error;
mod item;
pub mod response;
mod share;
pub mod signing;
pub mod transport;
mod trash;
mod types;

#[cfg(test)]
mod mock;

pub use client::RestAdapter;
pub use config::{Config, DEFAULT_API_VERSION};
pub use credential::{AuthState, Credential, Query, ResourceKind, Session, encode_path};
pub use error::{ClientError, Result};
pub use item::{Item, ItemKind, ItemOrigin};
pub use share::Share;
pub use signing::{HmacSha1Signer, RequestSigner};
pub use transport::{
    DownloadResponse, HttpResponse, MultipartUpload, RedirectResponse, ReqwestTransport, Transport,
};
pub use types::*;
