#![forbid(unsafe_code)]

pub mod events;
pub mod framing;

pub use events::{ChatPayload, ClientEvent, EditPayload, ImagePayload, ReadPayload, ServerEvent};
pub use framing::{
	DEFAULT_MAX_FRAME_SIZE, FramingError, decode_frame, encode_frame, encode_frame_default, encode_frame_into,
	try_decode_frame_from_buffer,
};
