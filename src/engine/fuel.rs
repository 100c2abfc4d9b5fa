/// Fuel estimate from distance driven today, for units without a fuel sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelModel {
    pub tank_capacity_l: f64,
    pub km_per_litre: f64,
}

impl Default for FuelModel {
    fn default() -> Self {
        Self {
            tank_capacity_l: 260.0,
            km_per_litre: 8.0,
        }
    }
}

impl FuelModel {
    /// `capacity - floor(distance / km_per_litre)`, never below zero.
    pub fn remaining_litres(&self, distance_today_km: f64) -> f64 {
        if self.km_per_litre <= 0.0 || !distance_today_km.is_finite() {
            return self.tank_capacity_l;
        }
        let used = (distance_today_km.max(0.0) / self.km_per_litre).floor();
        (self.tank_capacity_l - used).max(0.0)
    }

    pub fn percent_of_capacity(&self, litres: f64) -> f64 {
        if self.tank_capacity_l <= 0.0 {
            return 100.0;
        }
        litres * 100.0 / self.tank_capacity_l
    }
}
