use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Drivetrain layout; affects how much of the available grip can be converted to acceleration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drivetrain {
    Fwd,
    Rwd,
    Awd,
}

/// Read-only reference data for one car. Loaded once from the durable store or
/// bundled fixtures and never mutated; the physics kernel (C4) reads it by id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Car {
    pub id: Uuid,
    pub name: String,
    pub horsepower: f32,
    pub weight_kg: f32,
    pub drag_coef: f32,
    pub frontal_area_m2: f32,
    pub drivetrain: Drivetrain,
    pub tire_grip: f32, // coefficient, ~0.8 to 1.6
    pub gear_ratios: Vec<f32>,
    pub aero_downforce_kg_at_100mph: f32,
    pub fuel_economy_l100: f32, // liters per 100 km at race pace
    pub top_speed_kmh: f32,
}

impl Car {
    /// Power-limited top speed from a simple power-vs-drag balance, in m/s.
    /// power (W) = drag_force (N) * v (m/s); drag_force = 0.5 * rho * Cd * A * v^2.
    pub fn power_limited_top_speed_ms(&self) -> f32 {
        const AIR_DENSITY: f32 = 1.225;
        let power_w = self.horsepower * 745.7;
        let k = 0.5 * AIR_DENSITY * self.drag_coef * self.frontal_area_m2;
        if k <= 0.0 {
            return 0.0;
        }
        (power_w / k).cbrt()
    }

    /// The speed cap actually used by the physics kernel: the lower of the
    /// power-limited solution and the car's specified top speed.
    pub fn effective_top_speed_kmh(&self) -> f32 {
        (self.power_limited_top_speed_ms() * 3.6).min(self.top_speed_kmh)
    }
}

/// A fixed in-memory catalog of read-only cars, keyed by id. Not one of the
/// eleven numbered components; plumbing C4/C5 need to resolve a participant's
/// car by id without touching mutable race state.
#[derive(Debug, Clone, Default)]
pub struct CarCatalog {
    cars: std::collections::HashMap<Uuid, Car>,
}

impl CarCatalog {
    pub fn new(cars: Vec<Car>) -> Self {
        Self {
            cars: cars.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Car> {
        self.cars.get(&id)
    }

    /// Loads the bundled read-only fixture (`fixtures/cars.json`) used when
    /// no durable store is reachable at startup.
    pub fn load_from_fixture(path: &str) -> std::io::Result<CarCatalog> {
        let data = std::fs::read_to_string(path)?;
        let cars: Vec<Car> = serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(CarCatalog::new(cars))
    }
}
