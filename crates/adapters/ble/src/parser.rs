//! Heart Rate Measurement characteristic parser.
//!
//! Pure functions operating on raw `&[u8]` slices — no BLE dependency
//! needed. The Heart Rate Profile (GATT service `0x180D`) notifies
//! measurements on characteristic `0x2A37`; the first byte is a flags
//! field whose bit 0 selects the width of the rate value that follows:
//!
//! | Flags bit 0 | Heart rate field |
//! |-------------|------------------|
//! | 0 | `u8`, one byte |
//! | 1 | `u16`, two bytes little-endian |

use crate::error::{BleError, MeasurementParseError};

/// Heart Rate service UUID (`0x180D`).
pub const HEART_RATE_SERVICE: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_180D_0000_1000_8000_0080_5F9B_34FB);

/// Heart Rate Measurement characteristic UUID (`0x2A37`).
pub const HEART_RATE_MEASUREMENT: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_2A37_0000_1000_8000_0080_5F9B_34FB);

/// Flags bit selecting the 16-bit heart rate field.
const FLAG_RATE_U16: u8 = 0b0000_0001;

/// Extract the heart rate in bpm from a `0x2A37` notification payload.
///
/// Trailing fields (energy expended, RR intervals) follow the rate value
/// and are ignored here.
///
/// # Errors
///
/// Returns [`BleError::MeasurementParse`] when the payload is empty or
/// shorter than its flags byte promises.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Result<u16, BleError> {
    let Some(&flags) = data.first() else {
        return Err(BleError::MeasurementParse(MeasurementParseError::Empty));
    };

    if flags & FLAG_RATE_U16 == 0 {
        match data.get(1) {
            Some(&rate) => Ok(u16::from(rate)),
            None => Err(BleError::MeasurementParse(
                MeasurementParseError::TooShort {
                    expected: 2,
                    actual: data.len(),
                },
            )),
        }
    } else {
        match data.get(1..3) {
            Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]])),
            None => Err(BleError::MeasurementParse(
                MeasurementParseError::TooShort {
                    expected: 3,
                    actual: data.len(),
                },
            )),
        }
    }
}
