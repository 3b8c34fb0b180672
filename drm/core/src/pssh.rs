use crate::error::PsshError;
use crate::types::ProtectionSystemId;

/**
    Parsed PSSH box.

    ISOBMFF PSSH box layout:
      [0..4]    box_size: u32 big-endian (total box size including this header)
      [4..8]    box_type: "pssh" (0x70737368)
      [8]       version: u8 (0 or 1)
      [9..12]   flags: u24 (typically 0x000000)
      [12..28]  system_id: 16 bytes
      if version == 1:
        [28..32]  key_id_count: u32 big-endian
        [32..]    key_ids: key_id_count * 16 bytes
      [..]      data_size: u32 big-endian
      [..]      data: data_size bytes
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsshBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub system_id: [u8; 16],
    /**
        Key IDs from the box header (v1 only). Empty for v0 boxes.
    */
    pub key_ids: Vec<[u8; 16]>,
    /**
        System-specific payload. For Widevine a WidevinePsshData record
        stream, for PlayReady a PlayReady Header Object.
    */
    pub data: Vec<u8>,
}

impl PsshBox {
    /**
        Build a version 0 box for `system` around `data`.
    */
    pub fn v0(system: ProtectionSystemId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            version: 0,
            flags: [0; 3],
            system_id: system.to_bytes(),
            key_ids: Vec::new(),
            data: data.into(),
        }
    }

    /**
        Build a version 1 box for `system` listing `key_ids` in its header.
    */
    pub fn v1(system: ProtectionSystemId, key_ids: Vec<[u8; 16]>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            version: 1,
            flags: [0; 3],
            system_id: system.to_bytes(),
            key_ids,
            data: data.into(),
        }
    }

    /**
        Parse a base64-encoded PSSH box.
    */
    pub fn from_base64(pssh: &str) -> Result<Self, PsshError> {
        let bytes = data_encoding::BASE64
            .decode(pssh.trim().as_bytes())
            .map_err(|e| PsshError::InvalidBase64(format!("PSSH: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /**
        Parse a PSSH box from raw bytes (full ISOBMFF box starting with box_size).
    */
    pub fn from_bytes(input: &[u8]) -> Result<Self, PsshError> {
        // 4 (size) + 4 (type) + 1 (ver) + 3 (flags) + 16 (sysid) + 4 (data_size)
        if input.len() < 32 {
            return Err(pssh_err("input too short for PSSH box header"));
        }

        let box_size = read_u32_be(input, 0) as usize;
        if box_size > input.len() {
            return Err(pssh_err("box_size exceeds input length"));
        }
        if box_size < 32 {
            return Err(pssh_err("box_size smaller than PSSH header"));
        }

        let box_data = &input[..box_size];
        if &box_data[4..8] != b"pssh" {
            return Err(pssh_err("box_type is not 'pssh'"));
        }

        let version = box_data[8];
        if version > 1 {
            return Err(pssh_err(&format!("unsupported version {version}")));
        }

        let mut flags = [0u8; 3];
        flags.copy_from_slice(&box_data[9..12]);

        let mut system_id = [0u8; 16];
        system_id.copy_from_slice(&box_data[12..28]);

        let mut offset = 28;
        let mut key_ids = Vec::new();

        if version == 1 {
            check_bounds(box_data, offset, 4, "key_id_count")?;
            let kid_count = read_u32_be(box_data, offset) as usize;
            offset += 4;

            let kid_bytes = kid_count
                .checked_mul(16)
                .ok_or_else(|| pssh_err("key_id_count overflow"))?;
            check_bounds(box_data, offset, kid_bytes, "key_ids")?;
            for chunk in box_data[offset..offset + kid_bytes].chunks_exact(16) {
                let mut kid = [0u8; 16];
                kid.copy_from_slice(chunk);
                key_ids.push(kid);
            }
            offset += kid_bytes;
        }

        check_bounds(box_data, offset, 4, "data_size")?;
        let data_size = read_u32_be(box_data, offset) as usize;
        offset += 4;

        check_bounds(box_data, offset, data_size, "data")?;
        let data = box_data[offset..offset + data_size].to_vec();
        offset += data_size;

        if offset != box_size {
            return Err(pssh_err(&format!(
                "trailing bytes: consumed {offset}, box_size {box_size}"
            )));
        }

        Ok(PsshBox {
            version,
            flags,
            system_id,
            key_ids,
            data,
        })
    }

    /**
        Serialize back to ISOBMFF PSSH box bytes.
    */
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut size = 28usize;
        if self.version == 1 {
            size += 4 + self.key_ids.len() * 16;
        }
        size += 4 + self.data.len();

        let mut buf = Vec::with_capacity(size);
        buf.extend_from_slice(&(size as u32).to_be_bytes());
        buf.extend_from_slice(b"pssh");
        buf.push(self.version);
        buf.extend_from_slice(&self.flags);
        buf.extend_from_slice(&self.system_id);

        if self.version == 1 {
            buf.extend_from_slice(&(self.key_ids.len() as u32).to_be_bytes());
            for kid in &self.key_ids {
                buf.extend_from_slice(kid);
            }
        }

        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /**
        Serialize to a base64-encoded PSSH box string.
    */
    pub fn to_base64(&self) -> String {
        data_encoding::BASE64.encode(&self.to_bytes())
    }

    /**
        Identify the DRM system from the box's system ID.
        Returns `None` for systems the session manager does not handle.
    */
    pub fn system(&self) -> Option<ProtectionSystemId> {
        ProtectionSystemId::from_bytes(&self.system_id)
    }
}

pub(crate) fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn check_bounds(data: &[u8], offset: usize, need: usize, field: &str) -> Result<(), PsshError> {
    match offset.checked_add(need) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(pssh_err(&format!("truncated {field}"))),
    }
}

fn pssh_err(msg: &str) -> PsshError {
    PsshError::Malformed(msg.into())
}
