//! Binary stream codec
//!
//! An append-only byte buffer with a read cursor and typed read/write
//! operations. All values are little-endian. The format is not
//! self-describing: reads must happen in exactly the order the values were
//! written, so producer and consumer have to agree on the schema.
//!
//! Length-prefixed values (strings, nested streams) always embed a `u64`
//! byte count immediately before the payload.

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Errors produced when reading from a [`Stream`].
///
/// Reading past the end of the buffer is a caller bug, never a recoverable
/// condition; every consumer treats these as terminal.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("read past end of stream (wanted {wanted} bytes, {remaining} remaining)")]
    UnexpectedEof { wanted: usize, remaining: usize },

    #[error("length-prefixed string is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("decompressed size mismatch (expected {expected} bytes, got {actual})")]
    DecompressedSize { expected: usize, actual: usize },
}

/// Growable byte buffer with typed append/read operations and whole-buffer
/// block compression.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stream {
    data: Vec<u8>,
    cursor: usize,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    /// Total number of bytes in the buffer, regardless of cursor position.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    // --- writes (append) ---

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// u64 byte count + UTF-8 bytes.
    pub fn write_str(&mut self, v: &str) {
        self.write_u64(v.len() as u64);
        self.data.extend_from_slice(v.as_bytes());
    }

    pub fn write_vec2(&mut self, v: Vec2) {
        self.write_f32(v.x);
        self.write_f32(v.y);
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    pub fn write_vec4(&mut self, v: Vec4) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
        self.write_f32(v.w);
    }

    pub fn write_quat(&mut self, v: Quat) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
        self.write_f32(v.w);
    }

    /// 16 floats, column-major.
    pub fn write_mat4(&mut self, v: Mat4) {
        for f in v.to_cols_array() {
            self.write_f32(f);
        }
    }

    /// u64 byte count + the other stream's entire buffer.
    pub fn write_stream(&mut self, v: &Stream) {
        self.write_u64(v.len() as u64);
        self.data.extend_from_slice(&v.data);
    }

    // --- reads (consume from cursor) ---

    /// Borrow the next `count` bytes and advance the cursor.
    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8], StreamError> {
        if count > self.remaining() {
            return Err(StreamError::UnexpectedEof {
                wanted: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    fn reader(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    fn eof(&self, wanted: usize) -> StreamError {
        StreamError::UnexpectedEof {
            wanted,
            remaining: self.remaining(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        let v = self.reader().read_u8().map_err(|_| self.eof(1))?;
        self.cursor += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        let v = self
            .reader()
            .read_u16::<LittleEndian>()
            .map_err(|_| self.eof(2))?;
        self.cursor += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        let v = self
            .reader()
            .read_u32::<LittleEndian>()
            .map_err(|_| self.eof(4))?;
        self.cursor += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, StreamError> {
        let v = self
            .reader()
            .read_u64::<LittleEndian>()
            .map_err(|_| self.eof(8))?;
        self.cursor += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64, StreamError> {
        let v = self
            .reader()
            .read_i64::<LittleEndian>()
            .map_err(|_| self.eof(8))?;
        self.cursor += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        let v = self
            .reader()
            .read_f32::<LittleEndian>()
            .map_err(|_| self.eof(4))?;
        self.cursor += 4;
        Ok(v)
    }

    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        let v = self
            .reader()
            .read_f64::<LittleEndian>()
            .map_err(|_| self.eof(8))?;
        self.cursor += 8;
        Ok(v)
    }

    pub fn read_str(&mut self) -> Result<String, StreamError> {
        let len = self.read_u64()? as usize;
        let bytes = self.read_bytes(len)?.to_vec();
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, StreamError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, StreamError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4, StreamError> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    pub fn read_quat(&mut self) -> Result<Quat, StreamError> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        let w = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    pub fn read_mat4(&mut self) -> Result<Mat4, StreamError> {
        let mut cols = [0.0f32; 16];
        for f in cols.iter_mut() {
            *f = self.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    pub fn read_stream(&mut self) -> Result<Stream, StreamError> {
        let len = self.read_u64()? as usize;
        Ok(Stream::from_bytes(self.read_bytes(len)?.to_vec()))
    }

    // --- compression ---

    /// Compress the whole buffer into a new stream (LZ4 block format).
    pub fn compress(&self) -> Stream {
        Stream::from_bytes(lz4_flex::block::compress(&self.data))
    }

    /// Decompress the whole buffer into a new stream.
    ///
    /// `expected_size` is the uncompressed byte count recorded by the
    /// producer; a mismatch is an error.
    pub fn decompress(&self, expected_size: usize) -> Result<Stream, StreamError> {
        let out = lz4_flex::block::decompress(&self.data, expected_size)?;
        if out.len() != expected_size {
            return Err(StreamError::DecompressedSize {
                expected: expected_size,
                actual: out.len(),
            });
        }
        Ok(Stream::from_bytes(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trip() {
        let mut s = Stream::new();
        s.write_u8(7);
        s.write_u16(0xBEEF);
        s.write_u32(0xDEAD_BEEF);
        s.write_u64(u64::MAX - 1);
        s.write_i64(-42);
        s.write_f32(1.5);
        s.write_f64(-2.25);
        s.write_str("kit::Mesh");
        s.write_vec3(Vec3::new(1.0, 2.0, 3.0));
        s.write_quat(Quat::from_xyzw(0.0, 1.0, 0.0, 0.0));

        assert_eq!(s.read_u8().unwrap(), 7);
        assert_eq!(s.read_u16().unwrap(), 0xBEEF);
        assert_eq!(s.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(s.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(s.read_i64().unwrap(), -42);
        assert_eq!(s.read_f32().unwrap(), 1.5);
        assert_eq!(s.read_f64().unwrap(), -2.25);
        assert_eq!(s.read_str().unwrap(), "kit::Mesh");
        assert_eq!(s.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            s.read_quat().unwrap(),
            Quat::from_xyzw(0.0, 1.0, 0.0, 0.0)
        );
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn string_embeds_u64_length_prefix() {
        let mut s = Stream::new();
        s.write_str("abc");
        assert_eq!(s.len(), 8 + 3);
        assert_eq!(s.read_u64().unwrap(), 3);
    }

    #[test]
    fn read_past_end_is_an_error() {
        let mut s = Stream::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            s.read_u32(),
            Err(StreamError::UnexpectedEof { .. })
        ));
        // A failed read does not advance the cursor.
        assert_eq!(s.remaining(), 3);
        assert_eq!(s.read_u8().unwrap(), 1);
    }

    #[test]
    fn nested_stream_round_trip() {
        let mut inner = Stream::new();
        inner.write_u32(99);

        let mut outer = Stream::new();
        outer.write_stream(&inner);

        let mut back = outer.read_stream().unwrap();
        assert_eq!(back.read_u32().unwrap(), 99);
        assert_eq!(back.remaining(), 0);
    }

    #[test]
    fn compress_round_trip() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let s = Stream::from_bytes(payload.clone());
        let back = s.compress().decompress(s.len()).unwrap();
        assert_eq!(back.as_bytes(), payload.as_slice());
    }

    #[test]
    fn compress_round_trip_fixed_sequence() {
        // The reference sequence used by the test_compression command.
        let data = vec![0x00, 0x11, 0x44, 0x22, 0x33, b'f', b'o', b'o', b'b', b'a', b'r'];
        let s = Stream::from_bytes(data.clone());
        let back = s.compress().decompress(11).unwrap();
        assert_eq!(back.as_bytes(), data.as_slice());
    }

    #[test]
    fn compress_empty_round_trip() {
        let s = Stream::new();
        let back = s.compress().decompress(0).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn decompress_wrong_size_is_an_error() {
        let s = Stream::from_bytes(vec![1, 2, 3, 4]);
        let compressed = s.compress();
        assert!(compressed.decompress(3).is_err());
    }
}
