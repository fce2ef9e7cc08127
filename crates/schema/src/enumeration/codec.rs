//! Binary record for a stored enumeration
//!
//! # Format
//!
//! ```text
//! +-------------------+
//! | Version           | 4 bytes (u32 LE)
//! | Name Length       | 4 bytes (u32 LE)
//! | Name              | variable
//! | Path Name Length  | 4 bytes (u32 LE)
//! | Path Name         | variable
//! | Datatype          | 1 byte
//! | Cell Val Num      | 4 bytes (u32 LE)
//! | Ordered           | 1 byte (0 or 1)
//! | Data Length       | 8 bytes (u64 LE)
//! | Data              | variable
//! | Offsets Length    | 8 bytes (u64 LE), var-size only
//! | Offsets           | variable (u64 LE each), var-size only
//! +-------------------+
//! ```

use super::{Enumeration, OFFSET_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tessera_core::{Datatype, TesseraError, TesseraResult};

/// Current enumeration record version
pub const ENUMERATIONS_VERSION: u32 = 0;

fn truncated(e: std::io::Error) -> TesseraError {
    TesseraError::serialization(format!("Truncated enumeration record: {}", e))
}

fn read_bytes(reader: &mut &[u8], len: u64, what: &str) -> TesseraResult<Vec<u8>> {
    if len > reader.len() as u64 {
        return Err(TesseraError::serialization(format!(
            "Enumeration {} length {} exceeds the {} remaining bytes.",
            what,
            len,
            reader.len()
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn read_string(reader: &mut &[u8], what: &str) -> TesseraResult<String> {
    let len = reader.read_u32::<LittleEndian>().map_err(truncated)?;
    let bytes = read_bytes(reader, u64::from(len), what)?;
    String::from_utf8(bytes).map_err(|e| {
        TesseraError::serialization(format!("Enumeration {} is not valid UTF-8: {}", what, e))
    })
}

impl Enumeration {
    /// Encode into the versioned binary record
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            32 + self.name.len() + self.path_name.len() + self.byte_size() as usize,
        );

        bytes.extend_from_slice(&ENUMERATIONS_VERSION.to_le_bytes());

        bytes.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.extend_from_slice(&(self.path_name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(self.path_name.as_bytes());

        bytes.push(self.datatype.code());
        bytes.extend_from_slice(&self.cell_val_num.to_le_bytes());
        bytes.push(u8::from(self.ordered));

        bytes.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&self.data);

        if self.var_size() {
            let offsets_len = (self.offsets.len() * OFFSET_SIZE) as u64;
            bytes.extend_from_slice(&offsets_len.to_le_bytes());
            for offset in &self.offsets {
                bytes.extend_from_slice(&offset.to_le_bytes());
            }
        }

        bytes
    }

    /// Decode a record produced by [`Enumeration::serialize`]
    ///
    /// The decoded values are validated exactly as [`Enumeration::create`]
    /// validates fresh input.
    pub fn deserialize(bytes: &[u8]) -> TesseraResult<Self> {
        let mut reader = bytes;

        let version = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        if version > ENUMERATIONS_VERSION {
            return Err(TesseraError::serialization(format!(
                "Invalid enumeration version {}; maximum supported version is {}.",
                version, ENUMERATIONS_VERSION
            )));
        }

        let name = read_string(&mut reader, "name")?;
        let path_name = read_string(&mut reader, "path name")?;

        let code = reader.read_u8().map_err(truncated)?;
        let datatype = Datatype::from_code(code).ok_or_else(|| {
            TesseraError::serialization(format!("Invalid enumeration datatype code {}.", code))
        })?;
        let cell_val_num = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let ordered = match reader.read_u8().map_err(truncated)? {
            0 => false,
            1 => true,
            other => {
                return Err(TesseraError::serialization(format!(
                    "Invalid enumeration ordered flag {}.",
                    other
                )))
            }
        };

        let data_len = reader.read_u64::<LittleEndian>().map_err(truncated)?;
        let data = read_bytes(&mut reader, data_len, "data")?;

        let offsets = if cell_val_num == super::VAR_NUM {
            let offsets_len = reader.read_u64::<LittleEndian>().map_err(truncated)?;
            read_bytes(&mut reader, offsets_len, "offsets")?
        } else {
            Vec::new()
        };

        if !reader.is_empty() {
            return Err(TesseraError::serialization(format!(
                "Enumeration record has {} trailing bytes.",
                reader.len()
            )));
        }

        let data = (!data.is_empty()).then_some(data.as_slice());
        let offsets = (!offsets.is_empty()).then_some(offsets.as_slice());
        Enumeration::create_with_path_name(
            &name,
            &path_name,
            datatype,
            cell_val_num,
            ordered,
            data,
            offsets,
        )
        .map_err(|e| TesseraError::serialization(format!("Invalid enumeration record: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{encode_var_values, VAR_NUM};
    use super::*;

    #[test]
    fn test_fixed_record() {
        let enmr = Enumeration::from_fixed_values("e", true, &[1i32, 2, 3, 4, 5]).unwrap();
        let bytes = enmr.serialize();
        let decoded = Enumeration::deserialize(&bytes).unwrap();
        assert_eq!(decoded, enmr);
        assert_eq!(decoded.index_of(&4i32.to_le_bytes()), 3);
    }

    #[test]
    fn test_var_record_layout() {
        let enmr =
            Enumeration::from_var_values("e", Datatype::StringUtf8, false, &["ab", "", "c"])
                .unwrap();
        let bytes = enmr.serialize();

        let header = 4 + 4 + 1 + 4 + enmr.path_name().len() + 1 + 4 + 1;
        assert_eq!(&bytes[header..header + 8], &3u64.to_le_bytes());
        assert_eq!(&bytes[header + 8..header + 11], b"abc");
        assert_eq!(&bytes[header + 11..header + 19], &24u64.to_le_bytes());
        assert_eq!(bytes.len(), header + 19 + 24);

        let decoded = Enumeration::deserialize(&bytes).unwrap();
        assert_eq!(decoded, enmr);
        assert_eq!(decoded.index_of(b""), 1);
    }

    #[test]
    fn test_single_empty_value_record() {
        let (data, offsets) = encode_var_values(&[""]);
        assert!(data.is_empty());
        let enmr = Enumeration::create(
            "e",
            Datatype::StringAscii,
            VAR_NUM,
            false,
            None,
            Some(&offsets),
        )
        .unwrap();
        let decoded = Enumeration::deserialize(&enmr.serialize()).unwrap();
        assert_eq!(decoded.elem_count(), 1);
    }

    #[test]
    fn test_empty_record() {
        let enmr = Enumeration::create("e", Datatype::StringAscii, VAR_NUM, false, None, None)
            .unwrap();
        let decoded = Enumeration::deserialize(&enmr.serialize()).unwrap();
        assert_eq!(decoded.elem_count(), 0);
        assert_eq!(decoded.path_name(), enmr.path_name());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let enmr = Enumeration::from_fixed_values("e", false, &[1u8, 2]).unwrap();
        let mut bytes = enmr.serialize();
        bytes[..4].fill(1);
        let err = Enumeration::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, TesseraError::Serialization { .. }));
    }

    #[test]
    fn test_truncated_and_trailing_rejected() {
        let enmr = Enumeration::from_fixed_values("e", false, &[1u8, 2]).unwrap();
        let bytes = enmr.serialize();
        assert!(Enumeration::deserialize(&bytes[..bytes.len() - 1]).is_err());

        let mut extra = bytes.clone();
        extra.push(0);
        assert!(Enumeration::deserialize(&extra).is_err());
    }
}
