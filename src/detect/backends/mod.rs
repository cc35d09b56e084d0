pub mod stub;

#[cfg(feature = "backend-rqrr")]
pub mod rqrr;

pub use stub::{ScriptedNativeDetector, ScriptedSoftwareDecoder};

#[cfg(feature = "backend-rqrr")]
pub use self::rqrr::RqrrDecoder;
