//! Telemetry simulator
//!
//! Drives the pipeline without real vehicles: one healthy vehicle, one with
//! a slow battery decline and one already past critical thresholds. Drift
//! is deterministic so runs are reproducible.

use chrono::Utc;
use engine_lib::{ServiceType, TelemetryReading, Workshop};

struct VehicleProfile {
    vehicle_id: &'static str,
    battery_soh: f64,
    battery_temp: f64,
    voltage_imbalance: f64,
    motor_temp: f64,
    motor_efficiency: f64,
    coolant_temp: f64,
    coolant_level: f64,
    /// Per-tick drift applied to battery_soh and coolant_level
    decline_per_tick: f64,
}

/// Generates one reading per vehicle per tick
pub struct TelemetrySimulator {
    vehicles: Vec<VehicleProfile>,
    tick: u64,
}

impl TelemetrySimulator {
    pub fn new() -> Self {
        Self {
            vehicles: vec![
                VehicleProfile {
                    vehicle_id: "EV001",
                    battery_soh: 95.0,
                    battery_temp: 30.0,
                    voltage_imbalance: 0.1,
                    motor_temp: 60.0,
                    motor_efficiency: 92.0,
                    coolant_temp: 70.0,
                    coolant_level: 85.0,
                    decline_per_tick: 0.0,
                },
                VehicleProfile {
                    vehicle_id: "EV002",
                    battery_soh: 79.0,
                    battery_temp: 36.0,
                    voltage_imbalance: 0.25,
                    motor_temp: 77.0,
                    motor_efficiency: 84.0,
                    coolant_temp: 80.0,
                    coolant_level: 55.0,
                    decline_per_tick: 0.05,
                },
                VehicleProfile {
                    vehicle_id: "EV003",
                    battery_soh: 65.0,
                    battery_temp: 47.0,
                    voltage_imbalance: 0.55,
                    motor_temp: 88.0,
                    motor_efficiency: 72.0,
                    coolant_temp: 96.0,
                    coolant_level: 15.0,
                    decline_per_tick: 0.1,
                },
            ],
            tick: 0,
        }
    }

    /// Produce the next round of readings, advancing drift
    pub fn next_round(&mut self) -> Vec<TelemetryReading> {
        let now = Utc::now();
        let readings = self
            .vehicles
            .iter()
            .map(|v| {
                let drift = v.decline_per_tick * self.tick as f64;
                let mut reading = TelemetryReading::new(v.vehicle_id, now);
                reading.battery_soh = Some((v.battery_soh - drift).max(0.0));
                reading.battery_temp = Some(v.battery_temp);
                reading.voltage_imbalance = Some(v.voltage_imbalance);
                reading.motor_temp = Some(v.motor_temp);
                reading.motor_efficiency = Some(v.motor_efficiency);
                reading.coolant_temp = Some(v.coolant_temp);
                reading.coolant_level = Some((v.coolant_level - drift).max(0.0));
                reading
            })
            .collect();
        self.tick += 1;
        readings
    }
}

impl Default for TelemetrySimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Demo workshop roster registered at startup
pub fn demo_workshops() -> Vec<Workshop> {
    vec![
        Workshop {
            id: "ws_001".to_string(),
            name: "Central EV Workshop".to_string(),
            location: "Downtown".to_string(),
            capabilities: vec![
                ServiceType::BatteryService,
                ServiceType::MotorService,
                ServiceType::Corrective,
                ServiceType::Inspection,
            ],
            rating: 4.5,
        },
        Workshop {
            id: "ws_002".to_string(),
            name: "Northside Garage".to_string(),
            location: "North District".to_string(),
            capabilities: vec![ServiceType::General],
            rating: 4.2,
        },
        Workshop {
            id: "ws_003".to_string(),
            name: "Harbor Service Point".to_string(),
            location: "Harbor".to_string(),
            capabilities: vec![
                ServiceType::CoolingService,
                ServiceType::Preventive,
                ServiceType::Emergency,
                ServiceType::Corrective,
            ],
            rating: 3.8,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_covers_all_vehicles() {
        let mut sim = TelemetrySimulator::new();
        let round = sim.next_round();
        assert_eq!(round.len(), 3);
        assert!(round.iter().all(|r| r.battery_soh.is_some()));
    }

    #[test]
    fn test_drift_declines_over_ticks() {
        let mut sim = TelemetrySimulator::new();
        let first = sim.next_round();
        let second = sim.next_round();

        let soh = |round: &[TelemetryReading]| {
            round
                .iter()
                .find(|r| r.vehicle_id == "EV003")
                .and_then(|r| r.battery_soh)
                .unwrap()
        };
        assert!(soh(&second) < soh(&first));
    }

    #[test]
    fn test_demo_workshops_cover_corrective() {
        let workshops = demo_workshops();
        assert!(workshops
            .iter()
            .any(|w| w.offers(ServiceType::Corrective, ServiceType::General)));
    }
}
