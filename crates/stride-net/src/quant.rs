//! Quantized wire field types.
//!
//! Lossy fixed-precision encodings that bound per-move bandwidth:
//! acceleration at one decimal place, positions/velocities/offsets at two,
//! angles at one byte per revolution, and the view rotation packed into
//! four bytes. Quantization is idempotent — re-encoding a decoded value is
//! byte-identical — which the codec round-trip tests rely on.

use glam::Vec3;
use serde::{Deserialize, Serialize};

fn quantize(value: f32, scale: f32) -> i32 {
    let scaled = (value * scale).round();
    if scaled.is_finite() {
        scaled.clamp(i32::MIN as f32, i32::MAX as f32) as i32
    } else {
        0
    }
}

/// Vector quantized to one decimal place. Coarse class, used for
/// acceleration where direction matters more than magnitude precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantVec10 {
    /// X component × 10.
    pub x: i32,
    /// Y component × 10.
    pub y: i32,
    /// Z component × 10.
    pub z: i32,
}

impl QuantVec10 {
    /// Quantizes a vector. Non-finite components collapse to zero.
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            x: quantize(v.x, 10.0),
            y: quantize(v.y, 10.0),
            z: quantize(v.z, 10.0),
        }
    }

    /// Reconstructs the vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            self.x as f32 / 10.0,
            self.y as f32 / 10.0,
            self.z as f32 / 10.0,
        )
    }
}

/// Vector quantized to two decimal places. Fine class, used for positions,
/// velocities, and capsule-frame offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantVec100 {
    /// X component × 100.
    pub x: i32,
    /// Y component × 100.
    pub y: i32,
    /// Z component × 100.
    pub z: i32,
}

impl QuantVec100 {
    /// Quantizes a vector. Non-finite components collapse to zero.
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            x: quantize(v.x, 100.0),
            y: quantize(v.y, 100.0),
            z: quantize(v.z, 100.0),
        }
    }

    /// Reconstructs the vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            self.x as f32 / 100.0,
            self.y as f32 / 100.0,
            self.z as f32 / 100.0,
        )
    }
}

/// Compresses an angle in degrees to 256 steps per revolution.
pub fn compress_angle_byte(degrees: f32) -> u8 {
    let scaled = (degrees * 256.0 / 360.0).round();
    if scaled.is_finite() {
        (scaled as i64 & 0xFF) as u8
    } else {
        0
    }
}

/// Expands a byte angle back to degrees in `[0, 360)`.
pub fn decompress_angle_byte(byte: u8) -> f32 {
    byte as f32 * 360.0 / 256.0
}

/// Compresses an angle in degrees to 65536 steps per revolution.
pub fn compress_angle_short(degrees: f32) -> u16 {
    let scaled = (degrees * 65536.0 / 360.0).round();
    if scaled.is_finite() {
        (scaled as i64 & 0xFFFF) as u16
    } else {
        0
    }
}

/// Expands a short angle back to degrees in `[0, 360)`.
pub fn decompress_angle_short(short: u16) -> f32 {
    short as f32 * 360.0 / 65536.0
}

/// View rotation packed into four bytes: 16-bit yaw in the low half,
/// 16-bit pitch in the high half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackedView(pub u32);

impl PackedView {
    /// Packs yaw and pitch (degrees).
    pub fn pack(yaw: f32, pitch: f32) -> Self {
        let yaw = compress_angle_short(yaw) as u32;
        let pitch = compress_angle_short(pitch) as u32;
        Self(yaw | (pitch << 16))
    }

    /// Unpacked yaw in degrees.
    pub fn yaw(self) -> f32 {
        decompress_angle_short((self.0 & 0xFFFF) as u16)
    }

    /// Unpacked pitch in degrees.
    pub fn pitch(self) -> f32 {
        decompress_angle_short((self.0 >> 16) as u16)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant10_precision() {
        let v = Vec3::new(1.23, -4.56, 7.89);
        let q = QuantVec10::from_vec3(v);
        let back = q.to_vec3();
        assert!((back.x - 1.2).abs() < 1e-5);
        assert!((back.y - (-4.6)).abs() < 1e-5);
        assert!((back.z - 7.9).abs() < 1e-5);
    }

    #[test]
    fn test_quant100_precision() {
        let v = Vec3::new(123.456, -0.004, 9999.994);
        let q = QuantVec100::from_vec3(v);
        let back = q.to_vec3();
        assert!((back.x - 123.46).abs() < 1e-3);
        assert!((back.y - 0.0).abs() < 1e-5);
        assert!((back.z - 9999.99).abs() < 1e-2);
    }

    #[test]
    fn test_quantization_is_idempotent() {
        for v in [
            Vec3::new(0.05, -0.05, 0.15),
            Vec3::new(1000.33, -999.99, 0.01),
            Vec3::ZERO,
        ] {
            let q10 = QuantVec10::from_vec3(v);
            assert_eq!(QuantVec10::from_vec3(q10.to_vec3()), q10);
            let q100 = QuantVec100::from_vec3(v);
            assert_eq!(QuantVec100::from_vec3(q100.to_vec3()), q100);
        }
    }

    #[test]
    fn test_non_finite_collapses_to_zero() {
        let q = QuantVec100::from_vec3(Vec3::new(f32::NAN, f32::INFINITY, f32::NEG_INFINITY));
        assert_eq!(q, QuantVec100::default());
        assert_eq!(compress_angle_byte(f32::NAN), 0);
        assert_eq!(compress_angle_short(f32::INFINITY), 0);
    }

    #[test]
    fn test_angle_byte_roundtrip_is_idempotent() {
        for byte in [0u8, 1, 63, 64, 128, 200, 255] {
            let degrees = decompress_angle_byte(byte);
            assert_eq!(compress_angle_byte(degrees), byte);
        }
    }

    #[test]
    fn test_angle_byte_wraps_negative() {
        // -90° and 270° are the same heading.
        assert_eq!(compress_angle_byte(-90.0), compress_angle_byte(270.0));
    }

    #[test]
    fn test_angle_short_roundtrip_is_idempotent() {
        for short in [0u16, 1, 16384, 32768, 65535] {
            let degrees = decompress_angle_short(short);
            assert_eq!(compress_angle_short(degrees), short);
        }
    }

    #[test]
    fn test_packed_view_roundtrip() {
        let view = PackedView::pack(90.0, 315.0);
        assert!((view.yaw() - 90.0).abs() < 0.01);
        assert!((view.pitch() - 315.0).abs() < 0.01);

        // Idempotent through pack/unpack.
        let again = PackedView::pack(view.yaw(), view.pitch());
        assert_eq!(again, view);
    }
}
