#[cfg(test)]
mod proptest_ranges {
    use crate::range::{FieldRange, VoltageProfile};
    use crate::reading::{Node, SensorReading};
    use crate::source::{ReadingSource, SimulatedVoltageSensor};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Property: whole-step draws stay inside [min, max) for any valid range
        #[test]
        fn whole_draws_stay_in_range(
            min in -1.0e6f64..1.0e6,
            span in 0.001f64..1.0e4,
            seed in any::<u64>(),
        ) {
            let range = FieldRange::new(min, min + span).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..10_000 {
                let v = range.sample_whole(&mut rng);
                prop_assert!(range.contains(v), "{} outside [{}, {})", v, range.min(), range.max());
            }
        }

        // Property: jitter never pushes a draw to or past max
        #[test]
        fn jittered_draws_stay_in_range(
            min in -1.0e4f64..1.0e4,
            span in 0.001f64..500.0,
            seed in any::<u64>(),
        ) {
            let range = FieldRange::new(min, min + span).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..10_000 {
                let v = range.sample_with_jitter(&mut rng);
                prop_assert!(range.contains(v), "{} outside [{}, {})", v, range.min(), range.max());
            }
        }

        // Property: every node label comes from the fixed set for any draw
        #[test]
        fn unit_draw_maps_to_one_label(u in 0.0f64..1.0) {
            let node = Node::from_unit(u);
            let expected = if u < 1.0 / 3.0 { Node::A } else if u < 2.0 / 3.0 { Node::B } else { Node::C };
            prop_assert_eq!(node, expected);
        }

        // Property: custom voltage profiles are honoured by the simulated sensor
        #[test]
        fn voltage_sensor_honours_profile(
            vmin in 0.0f64..50.0,
            vspan in 1.0f64..50.0,
            tmin in -40.0f64..100.0,
            tspan in 0.5f64..40.0,
            seed in any::<u64>(),
        ) {
            let profile = VoltageProfile {
                voltage: FieldRange::new(vmin, vmin + vspan).unwrap(),
                temperature: FieldRange::new(tmin, tmin + tspan).unwrap(),
            };
            let mut sensor = SimulatedVoltageSensor::with_seed(profile, seed);
            for ts in 0..1_000 {
                if let SensorReading::Voltage(r) = sensor.sample(ts) {
                    prop_assert!(profile.voltage.contains(r.voltage));
                    prop_assert!(profile.temperature.contains(r.temperature));
                } else {
                    prop_assert!(false, "voltage sensor produced another kind");
                }
            }
        }
    }
}
