use uuid::Uuid;

use crate::command::Command;
use crate::events::{EventPayload, EventType, IncidentReason, RaceEvent};
use crate::models::{Car, Environment, Track};
use crate::race::state::Participant;

const LOW_FUEL_THRESHOLD: f32 = 5.0;
const TIRE_WEAR_INCIDENT_THRESHOLD: f32 = 80.0;
const GRAVITY_MS2: f32 = 9.81;
const AIR_DENSITY: f32 = 1.225;
const ROLLING_RESISTANCE_COEF: f32 = 0.015;

/// Local events a single tick's physics step can raise for its participant,
/// independent of the race-wide overtake/lap-complete detection the engine
/// computes afterward from the whole field.
pub struct LocalEvents {
    pub low_fuel_crossed: bool,
    pub tire_wear_crossed: bool,
    pub lap_completed: Option<u32>,
    pub lap_time_sec: Option<f32>,
}

/// Pure per-participant physics update (C4, §4.3). Given identical inputs
/// this always returns identical outputs — no wall clock, no RNG, no shared
/// state is touched.
pub fn step(
    participant: &Participant,
    car: &Car,
    command: Command,
    track: &Track,
    dt: f32,
    environment: Environment,
) -> (Participant, LocalEvents) {
    let mut next = participant.clone();
    let (throttle, brake) = command.throttle_brake();

    let effective_throttle = if next.fuel_pct <= 0.0 { 0.0 } else { throttle };

    let curvature = track.curvature_at(next.location.distance_meters);
    let corner_radius_m = if curvature.abs() > 1e-6 {
        1.0 / curvature.abs()
    } else {
        f32::INFINITY
    };

    let speed_ms = next.speed_kmh / 3.6;
    let new_speed_ms = integrate_speed(
        speed_ms,
        effective_throttle,
        brake,
        car,
        environment,
        corner_radius_m,
        dt,
    );
    let top_speed_ms = car.effective_top_speed_kmh() / 3.6;
    let new_speed_ms = new_speed_ms.clamp(0.0, top_speed_ms);
    next.speed_kmh = new_speed_ms * 3.6;

    let avg_speed_ms = (speed_ms + new_speed_ms) / 2.0;
    let distance_delta_m = avg_speed_ms * dt;
    let new_distance = next.location.distance_meters + distance_delta_m;
    let laps_advanced = (new_distance / track.length_m).floor() as u32;
    next.location.distance_meters = new_distance.rem_euclid(track.length_m);
    let (lap_completed, lap_time_sec) = if laps_advanced > 0 {
        next.location.lap += laps_advanced;
        let completed_lap_time = next.lap_time_sec + dt;
        next.lap_time_sec = 0.0;
        (Some(next.location.lap), Some(completed_lap_time))
    } else {
        next.lap_time_sec += dt;
        (None, None)
    };
    next.location.sector = sector_for_distance(next.location.distance_meters, track);

    let prev_fuel = next.fuel_pct;
    let fuel_consumed = car.fuel_economy_l100 / 100.0 * (distance_delta_m / 1000.0) * 8.0;
    next.fuel_pct = (next.fuel_pct - fuel_consumed).clamp(0.0, 100.0);
    let low_fuel_crossed = prev_fuel > LOW_FUEL_THRESHOLD && next.fuel_pct <= LOW_FUEL_THRESHOLD;

    let prev_max_wear = next.tire_wear.front.max(next.tire_wear.rear);
    let lateral_g = if corner_radius_m.is_finite() && corner_radius_m > 0.0 {
        (speed_ms * speed_ms) / (corner_radius_m * GRAVITY_MS2)
    } else {
        0.0
    };
    let braking_g = (brake * 1.2).min(1.5);
    let wear_rate = (new_speed_ms / 10.0 + lateral_g * 2.0 + braking_g)
        * (car.weight_kg / 1200.0)
        / car.tire_grip.max(0.1);
    next.tire_wear.rear = (next.tire_wear.rear + wear_rate * dt).clamp(0.0, 100.0);
    next.tire_wear.front = (next.tire_wear.front + wear_rate * 1.2 * dt).clamp(0.0, 100.0);
    let new_max_wear = next.tire_wear.front.max(next.tire_wear.rear);
    let tire_wear_crossed =
        prev_max_wear <= TIRE_WEAR_INCIDENT_THRESHOLD && new_max_wear > TIRE_WEAR_INCIDENT_THRESHOLD;

    next.total_time_sec += dt;
    next.last_command_type = Some(command_label(command));

    (
        next,
        LocalEvents {
            low_fuel_crossed,
            tire_wear_crossed,
            lap_completed,
            lap_time_sec,
        },
    )
}

/// Builds the `incident` events a tick's local physics flags warrant. Kept
/// separate from `step` so the engine controls event id/tick-time stamping.
pub fn incident_events(
    race_id: Uuid,
    tick_time: u64,
    player_id: Uuid,
    local: &LocalEvents,
) -> Vec<RaceEvent> {
    let mut out = Vec::new();
    if local.low_fuel_crossed {
        out.push(RaceEvent::new(
            race_id,
            tick_time,
            EventType::Incident,
            vec![player_id],
            EventPayload::Incident { player_id, reason: IncidentReason::LowFuel },
        ));
    }
    if local.tire_wear_crossed {
        out.push(RaceEvent::new(
            race_id,
            tick_time,
            EventType::Incident,
            vec![player_id],
            EventPayload::Incident { player_id, reason: IncidentReason::TireWearCritical },
        ));
    }
    out
}

fn integrate_speed(
    speed_ms: f32,
    throttle: f32,
    brake: f32,
    car: &Car,
    environment: Environment,
    corner_radius_m: f32,
    dt: f32,
) -> f32 {
    let grip_force_n = car.tire_grip * environment.grip_multiplier * car.weight_kg * GRAVITY_MS2;
    let power_w = car.horsepower * 745.7 * throttle;
    let drive_force_n = if speed_ms > 0.5 {
        (power_w / speed_ms).min(grip_force_n)
    } else {
        grip_force_n.min(car.horsepower * 745.7 / 0.5)
    };

    let drag_force_n = 0.5 * AIR_DENSITY * car.drag_coef * car.frontal_area_m2 * speed_ms * speed_ms;
    let rolling_force_n = ROLLING_RESISTANCE_COEF * car.weight_kg * GRAVITY_MS2;
    let brake_force_n = brake * grip_force_n;

    let corner_speed_cap_ms = if corner_radius_m.is_finite() {
        (corner_radius_m * GRAVITY_MS2 * car.tire_grip * environment.grip_multiplier).sqrt()
    } else {
        f32::INFINITY
    };

    let net_force_n = drive_force_n - drag_force_n - rolling_force_n - brake_force_n;
    let acceleration_ms2 = net_force_n / car.weight_kg;
    let proposed = (speed_ms + acceleration_ms2 * dt).max(0.0);
    proposed.min(corner_speed_cap_ms)
}

fn sector_for_distance(distance_m: f32, track: &Track) -> u32 {
    if track.sectors == 0 {
        return 0;
    }
    let ratio = distance_m / track.length_m;
    ((ratio * track.sectors as f32).floor() as u32).min(track.sectors - 1)
}

fn command_label(command: Command) -> String {
    match command {
        Command::Accelerate { .. } => "accelerate".to_string(),
        Command::Brake { .. } => "brake".to_string(),
        Command::Shift { .. } => "shift".to_string(),
        Command::Coast => "coast".to_string(),
        Command::Pit => "pit".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Drivetrain;

    fn test_car() -> Car {
        Car {
            id: Uuid::new_v4(),
            name: "test".into(),
            horsepower: 500.0,
            weight_kg: 800.0,
            drag_coef: 0.9,
            frontal_area_m2: 1.5,
            drivetrain: Drivetrain::Rwd,
            tire_grip: 1.2,
            gear_ratios: vec![3.0, 2.2, 1.8, 1.4, 1.1, 0.9],
            aero_downforce_kg_at_100mph: 100.0,
            fuel_economy_l100: 40.0,
            top_speed_kmh: 320.0,
        }
    }

    fn test_track() -> Track {
        Track {
            id: Uuid::new_v4(),
            name: "test".into(),
            length_m: 5000.0,
            sectors: 3,
            corners: 10,
            elevation_change_m: 20.0,
            surface: crate::models::Surface::Asphalt,
            difficulty: 0.5,
            sampled_curvature: vec![crate::models::TrackPoint { x: 0.0, y: 0.0, curvature: 0.0 }],
        }
    }

    #[test]
    fn determinism_same_inputs_same_outputs() {
        let p = Participant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1);
        let car = test_car();
        let track = test_track();
        let (a, _) = step(&p, &car, Command::Accelerate { intensity: 1.0 }, &track, 0.1, Environment::dry());
        let (b, _) = step(&p, &car, Command::Accelerate { intensity: 1.0 }, &track, 0.1, Environment::dry());
        assert_eq!(a.speed_kmh, b.speed_kmh);
        assert_eq!(a.location.distance_meters, b.location.distance_meters);
    }

    #[test]
    fn fuel_never_goes_negative_and_disables_throttle_at_zero() {
        let mut p = Participant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1);
        p.fuel_pct = 0.0;
        let car = test_car();
        let track = test_track();
        let (next, _) = step(&p, &car, Command::Accelerate { intensity: 1.0 }, &track, 0.1, Environment::dry());
        assert!(next.fuel_pct >= 0.0);
        assert!(next.speed_kmh >= 0.0);
    }

    #[test]
    fn speed_never_exceeds_top_speed() {
        let p = Participant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1);
        let car = test_car();
        let track = test_track();
        let mut state = p;
        for _ in 0..2000 {
            let (next, _) = step(&state, &car, Command::Accelerate { intensity: 1.0 }, &track, 0.1, Environment::dry());
            state = next;
            assert!(state.speed_kmh <= car.effective_top_speed_kmh() + 0.01);
        }
    }

    #[test]
    fn tire_wear_saturates_at_100() {
        let mut p = Participant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1);
        p.tire_wear.front = 99.9;
        p.tire_wear.rear = 99.9;
        p.speed_kmh = 300.0;
        let car = test_car();
        let track = test_track();
        let (next, _) = step(&p, &car, Command::Brake { intensity: 1.0 }, &track, 1.0, Environment::dry());
        assert!(next.tire_wear.front <= 100.0);
        assert!(next.tire_wear.rear <= 100.0);
    }

    #[test]
    fn lap_increments_with_overflow_residual() {
        let mut p = Participant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1);
        p.location.distance_meters = 4999.0;
        p.speed_kmh = 360.0; // 100 m/s
        let car = test_car();
        let track = test_track();
        let (next, local) = step(&p, &car, Command::Coast, &track, 1.0, Environment::dry());
        assert!(local.lap_completed.is_some());
        assert!(local.lap_time_sec.unwrap() > 0.0);
        assert!(next.location.distance_meters < track.length_m);
        assert_eq!(next.lap_time_sec, 0.0, "lap timer resets once the completed lap's time is reported");
    }
}
