#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use tessera_image as image;

#[doc(inline)]
pub use tessera_framework as framework;

#[doc(inline)]
pub use tessera_imgproc as imgproc;
