// sensors.rs
use crate::types::AccelSample;

/// Pull-based access to the ride sensors. One call, one fresh reading.
pub trait SensorSource {
    /// Acceleration in g, X along the direction of travel.
    fn accel(&mut self) -> AccelSample;
    fn temperature_c(&mut self) -> f32;
    /// Ambient light, 0 (dark) to 100 (bright).
    fn ambient_light_pct(&mut self) -> f32;
}

impl<S: SensorSource + ?Sized> SensorSource for &mut S {
    fn accel(&mut self) -> AccelSample {
        (**self).accel()
    }

    fn temperature_c(&mut self) -> f32 {
        (**self).temperature_c()
    }

    fn ambient_light_pct(&mut self) -> f32 {
        (**self).ambient_light_pct()
    }
}

/// MPU6050 accelerometer at the ±8 g range.
pub const MPU6050_ACCEL_LSB_PER_G: f32 = 4096.0;

/// Full scale of the 14-bit ADC the photoresistor divider is wired to.
pub const LIGHT_ADC_FULL_SCALE: f32 = 16_384.0;

pub fn mpu6050_accel_g(raw: [i16; 3]) -> AccelSample {
    AccelSample::new(
        f32::from(raw[0]) / MPU6050_ACCEL_LSB_PER_G,
        f32::from(raw[1]) / MPU6050_ACCEL_LSB_PER_G,
        f32::from(raw[2]) / MPU6050_ACCEL_LSB_PER_G,
    )
}

/// Die temperature of the MPU6050.
pub fn mpu6050_temperature_c(raw: i16) -> f32 {
    f32::from(raw) / 340.0 + 36.53
}

pub fn light_pct_from_adc(raw: u16) -> f32 {
    (f32::from(raw) / LIGHT_ADC_FULL_SCALE * 100.0).clamp(0.0, 100.0)
}

/// Factory calibration of the on-chip temperature sensor (ADC counts at 30 °C and 85 °C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempCalibration {
    pub cal_30c: u16,
    pub cal_85c: u16,
}

impl TempCalibration {
    /// Linear interpolation between the two points; `None` for a degenerate calibration.
    pub fn celsius(&self, raw: u16) -> Option<f32> {
        if self.cal_85c == self.cal_30c {
            return None;
        }
        let span = f32::from(self.cal_85c) - f32::from(self.cal_30c);
        Some((f32::from(raw) - f32::from(self.cal_30c)) * 55.0 / span + 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accel_conversion() {
        let sample = mpu6050_accel_g([4096, -2048, 0]);
        assert_relative_eq!(sample.x, 1.0);
        assert_relative_eq!(sample.y, -0.5);
        assert_relative_eq!(sample.z, 0.0);
    }

    #[test]
    fn test_mpu6050_temperature() {
        assert_relative_eq!(mpu6050_temperature_c(0), 36.53);
        assert_relative_eq!(mpu6050_temperature_c(-3400), 26.53, epsilon = 1e-4);
    }

    #[test]
    fn test_light_percentage() {
        assert_relative_eq!(light_pct_from_adc(8192), 50.0);
        assert_relative_eq!(light_pct_from_adc(u16::MAX), 100.0);
    }

    #[test]
    fn test_on_chip_temperature() {
        let cal = TempCalibration {
            cal_30c: 1000,
            cal_85c: 1550,
        };
        assert_relative_eq!(cal.celsius(1000).unwrap(), 30.0);
        assert_relative_eq!(cal.celsius(1550).unwrap(), 85.0);
        assert_relative_eq!(cal.celsius(1100).unwrap(), 40.0);

        let broken = TempCalibration {
            cal_30c: 1000,
            cal_85c: 1000,
        };
        assert_eq!(broken.celsius(1000), None);
    }
}
