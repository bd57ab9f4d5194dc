//! kit-common - Kit engine binary asset formats
//!
//! Provides the byte stream codec and the `.asset` container format shared
//! by the export pipeline and any consumer that reads Kit assets.

pub mod asset;
pub mod stream;

pub use asset::{
    AssetError, ASSET_MAGIC, ASSET_VERSION, decode_asset, encode_asset, read_asset, write_asset,
};
pub use stream::{Stream, StreamError};
