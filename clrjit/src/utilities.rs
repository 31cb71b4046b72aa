use std::io::{Cursor, Read};
use std::mem::size_of;

/// Minimal byte-stream reading trait. Every fixed-width encoding that shows
/// up in a CIL instruction stream (opcodes, branch offsets, metadata
/// tokens) implements this the same way.
pub trait FromByteStream where Self: Sized {
	fn read(stream: &mut Cursor<&[u8]>) -> std::io::Result<Self>;
}

impl FromByteStream for u8 {
	#[inline]
	fn read(stream: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
		let mut byte = 0u8;
		stream.read_exact(std::slice::from_mut(&mut byte))?;
		Ok(byte)
	}
}

impl FromByteStream for i8 {
	#[inline]
	fn read(stream: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
		Ok(u8::read(stream)? as i8)
	}
}

// TODO handle big endian architectures
macro_rules! impl_from_le_byte_stream {
	($($ty: ty),*) => {$(
		impl crate::utilities::FromByteStream for $ty {
			#[inline]
			fn read(stream: &mut std::io::Cursor<&[u8]>) -> std::io::Result<Self> {
				let mut bytes = [0u8; size_of::<Self>()];
				stream.read_exact(&mut bytes)?;
				Ok(Self::from_le_bytes(bytes))
			}
		}
	)*};
}

impl_from_le_byte_stream!(u16, u32, u64, i16, i32, i64, f32, f64);
