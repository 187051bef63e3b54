#[cfg(test)]
mod proptest_unit {
    use crate::entropy::SeededEntropy;
    use crate::limits::{Setpoint, UnitLimits};
    use crate::state::PlcState;
    use crate::unit::{speed_allowance, Unit, UnstartedUnit};
    use proptest::prelude::*;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Op {
        Tick(u64),
        EmergencyStop,
        Start,
        Target(i32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (0u64..=500).prop_map(Op::Tick),
            1 => Just(Op::EmergencyStop),
            1 => Just(Op::Start),
            2 => (-500i32..=2500).prop_map(Op::Target),
        ]
    }

    fn unit(seed: u64) -> Unit {
        UnstartedUnit::new(UnitLimits::default(), SeededEntropy::new(seed)).start()
    }

    fn rate(state: PlcState, limits: &UnitLimits) -> Option<i64> {
        match state {
            PlcState::Normal => Some(limits.ramp_rate_rpm_s),
            PlcState::MaintenanceNeeded => Some(limits.coast_down_rate_rpm_s),
            PlcState::EmergencyStop => None,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // Property: every tick leaves the unit inside its invariants
        #[test]
        fn invariants_hold_after_every_tick(
            seed in any::<u64>(),
            ops in prop::collection::vec(op(), 1..400),
        ) {
            let mut unit = unit(seed);
            let limits = UnitLimits::default();
            let mut reached_maintenance = false;

            for op in ops {
                match op {
                    Op::EmergencyStop => unit.request_emergency_stop(),
                    Op::Start => unit.request_start(),
                    Op::Target(rpm) => unit.set_target_speed(Setpoint::new(rpm).clamp(&limits)),
                    Op::Tick(ms) => {
                        let dt = Duration::from_millis(ms);
                        let before = unit.actual_speed();
                        unit.update(dt);
                        let state = unit.state();

                        if state.is_failure() {
                            prop_assert_eq!(unit.target_speed(), 0);
                        }
                        if state == PlcState::EmergencyStop {
                            prop_assert_eq!(unit.actual_speed(), 0);
                        }
                        if let Some(rate) = rate(state, &limits) {
                            let moved = i64::from((unit.actual_speed() - before).abs());
                            prop_assert!(moved <= speed_allowance(rate, dt),
                                "moved {} in {:?} at {:?}", moved, dt, state);
                        }
                        if reached_maintenance {
                            prop_assert_eq!(state, PlcState::MaintenanceNeeded);
                        }
                        reached_maintenance |= state == PlcState::MaintenanceNeeded;

                        prop_assert!(unit.actual_speed() >= 0);
                        if unit.actual_speed() == 0 {
                            prop_assert!(unit.temperature() >= limits.ambient_temperature);
                        }
                    }
                }
            }
        }

        // Property: a motionless unit at ambient is untouched by zero-length ticks
        #[test]
        fn zero_tick_at_rest_is_identity(seed in any::<u64>(), ticks in 1usize..50) {
            let mut unit = unit(seed);
            let before = unit.snapshot();
            for _ in 0..ticks {
                unit.update(Duration::ZERO);
            }
            prop_assert_eq!(unit.snapshot(), before);
        }
    }
}
