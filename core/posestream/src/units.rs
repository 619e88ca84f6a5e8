//! Unit conversions for filter parameters, expressed through uom so the
//! configured degrees and meters never get mixed up with radians and centimeters.

use uom::si::angle::{degree, radian};
use uom::si::f32::{Angle, Length};
use uom::si::length::{centimeter, meter};

pub fn degrees_to_radians(degrees: f32) -> f32 {
    Angle::new::<degree>(degrees).get::<radian>()
}

pub fn radians_to_degrees(radians: f32) -> f32 {
    Angle::new::<radian>(radians).get::<degree>()
}

pub fn meters_to_centimeters(meters: f32) -> f32 {
    Length::new::<meter>(meters).get::<centimeter>()
}
