//! CRC16/XMODEM checksum
//!
//! Polynomial 0x1021, initial value 0x0000, no reflection, no final XOR.
//! Every frame is checked independently; the CRC register is never carried
//! from one frame to the next.

/// CCITT polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// XMODEM seed
pub const INIT: u16 = 0x0000;

/// Precomputed lookup table for [`POLYNOMIAL`]
pub static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continue a CRC computation over more bytes
///
/// `crc16(a ++ b) == update(crc16(a), b)`
pub fn update(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ TABLE[((crc >> 8) ^ byte as u16) as usize & 0xFF]
    })
}

/// Calculate the CRC16/XMODEM of `data`
///
/// # Examples
///
/// ```
/// use mpctl_core::checksum;
///
/// assert_eq!(checksum::crc16(b"123456789"), 0x31C3);
/// assert_eq!(checksum::crc16(&[]), 0x0000);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    update(INIT, data)
}
