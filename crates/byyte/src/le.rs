use std::io;
use std::io::Result;

pub trait ByteReader: io::Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }
    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a fixed-size signature such as `MZ` or `NE`.
    fn read_tag<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads words until the reader is exhausted. A dangling odd byte is an error.
    fn read_u16_array(&mut self) -> Result<Vec<u16>> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        if bytes.len() % 2 != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Odd byte count for u16 array"));
        }
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }
}

impl<R: io::Read + ?Sized> ByteReader for R {}

pub trait ByteWriter: io::Write {
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }
    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }
    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }
}

impl<W: io::Write + ?Sized> ByteWriter for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_little_endian() {
        let mut reader = Cursor::new(vec![0x4D, 0x5A, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(&reader.read_tag::<2>().unwrap(), b"MZ");
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_u16_array() {
        let mut reader = Cursor::new(vec![0x01, 0x00, 0xFF, 0xFF]);
        assert_eq!(reader.read_u16_array().unwrap(), vec![1, 0xFFFF]);

        let mut odd = Cursor::new(vec![0x01, 0x00, 0x02]);
        assert_eq!(odd.read_u16_array().unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_writer_round_trips_header_fields() {
        let mut data = Vec::new();
        data.write_u16(0x0200).unwrap();
        data.write_u32(0x40).unwrap();
        data.write_u8(9).unwrap();
        assert_eq!(data, vec![0x00, 0x02, 0x40, 0x00, 0x00, 0x00, 9]);
    }
}
