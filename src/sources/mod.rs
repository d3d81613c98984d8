//! Network sources.
//!
//! Everything the installer fetches over HTTP goes through [`HttpClient`].

pub mod asset;
pub mod http;

pub use asset::{Asset, AssetProvisioner, Provisioned};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
