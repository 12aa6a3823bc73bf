mod access;
mod error;
mod financing;
mod integrity;
mod invoice;
mod money;

pub use access::*;
pub use error::*;
pub use financing::*;
pub use integrity::*;
pub use invoice::*;
pub use money::*;
