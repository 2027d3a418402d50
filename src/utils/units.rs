//! Distances on the field are kept in centimeters.

pub fn inch(from_inches: f64) -> f64 {
    from_inches * 2.54
}
pub fn ft(from_feet: f64) -> f64 {
    from_feet * 30.48
}
pub fn tile(from_tiles: f64) -> f64 {
    from_tiles * 60.96
}
pub fn m(from_meters: f64) -> f64 {
    from_meters * 100.0
}
