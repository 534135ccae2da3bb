/// Big-endian byte output that units emit into.
pub trait Sink {
    fn put_u8(&mut self, val: u8);
    fn put_u16(&mut self, val: u16);
    fn put_u32(&mut self, val: u32);
    fn put_slice(&mut self, bytes: &[u8]);
    /// Number of bytes written so far.
    fn offset(&self) -> usize;
}

impl Sink for Vec<u8> {
    fn put_u8(&mut self, val: u8) {
        self.push(val);
    }
    fn put_u16(&mut self, val: u16) {
        self.extend_from_slice(&val.to_be_bytes());
    }
    fn put_u32(&mut self, val: u32) {
        self.extend_from_slice(&val.to_be_bytes());
    }
    fn put_slice(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
    fn offset(&self) -> usize {
        self.len()
    }
}

pub fn read_be_u32(bytes: &[u8], off: usize) -> Option<u32> {
    let word = bytes.get(off..off + 4)?;
    Some(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

pub fn write_be_u32(bytes: &mut [u8], off: usize, val: u32) {
    bytes[off..off + 4].copy_from_slice(&val.to_be_bytes());
}
