// state_machine/tests.rs
#[cfg(test)]
mod tests {
    use crate::config::{ClassifierConfig, NUM_FLASH};
    use crate::lights::Lights;
    use crate::lights::mock::MockPin;
    use crate::sensors::SensorSource;
    use crate::state_machine::{BikeClassifier, ControlCells, Reading, classify, on_flash_tick};
    use crate::types::{AccelSample, BikeState, FlashAction, LightCommand};
    use approx::assert_relative_eq;

    const NORMAL: Reading = Reading {
        avg_accel_x_g: 0.0,
        temperature_c: 25.0,
        light_pct: 80.0,
    };

    fn reading(avg_accel_x_g: f32, temperature_c: f32, light_pct: f32) -> Reading {
        Reading {
            avg_accel_x_g,
            temperature_c,
            light_pct,
        }
    }

    /// Alternates two X values so the window average is their mean.
    struct ScriptedSensors {
        x: [f32; 2],
        temperature_c: f32,
        light_pct: f32,
        accel_reads: usize,
    }

    impl SensorSource for ScriptedSensors {
        fn accel(&mut self) -> AccelSample {
            let x = self.x[self.accel_reads % 2];
            self.accel_reads += 1;
            AccelSample::new(x, 0.0, 1.0)
        }

        fn temperature_c(&mut self) -> f32 {
            self.temperature_c
        }

        fn ambient_light_pct(&mut self) -> f32 {
            self.light_pct
        }
    }

    #[test]
    fn test_initial_state() {
        let cells = ControlCells::new();
        let clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);
        assert_eq!(clf.state(), BikeState::Idle);
        assert_eq!(cells.state.load(), BikeState::Idle);
        assert_eq!(cells.flashes.get(), 0);
    }

    #[test]
    fn test_classify_priority() {
        let cfg = ClassifierConfig::new();
        // Hot, braking and dark at once: temperature wins.
        assert_eq!(classify(&reading(-0.5, 70.0, 10.0), &cfg), BikeState::Error);
        assert_eq!(classify(&reading(-0.5, 25.0, 10.0), &cfg), BikeState::Braking);
        assert_eq!(classify(&reading(0.0, 25.0, 10.0), &cfg), BikeState::LowAmbientLight);
        assert_eq!(classify(&NORMAL, &cfg), BikeState::Moving);
    }

    #[test]
    fn test_classify_thresholds_are_strict() {
        let cfg = ClassifierConfig::new();
        assert_eq!(classify(&reading(0.0, cfg.t_max_c, 80.0), &cfg), BikeState::Moving);
        assert_eq!(classify(&reading(cfg.acc_threshold_g, 25.0, 80.0), &cfg), BikeState::Moving);
        assert_eq!(classify(&reading(0.0, 25.0, cfg.light_threshold_pct), &cfg), BikeState::Moving);
    }

    #[test]
    fn test_normal_riding_alternates_idle_and_moving() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);

        for _ in 0..3 {
            assert_eq!(clf.step(NORMAL), LightCommand::None);
            assert_eq!(clf.state(), BikeState::Moving);
            assert_eq!(cells.state.load(), BikeState::Moving);

            assert_eq!(clf.step(NORMAL), LightCommand::AllOff);
            assert_eq!(clf.state(), BikeState::Idle);
        }
    }

    #[test]
    fn test_low_light_turns_lights_on() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);
        let dark = reading(0.0, 20.0, 15.0);

        clf.step(dark);
        assert_eq!(clf.state(), BikeState::LowAmbientLight);
        assert_eq!(clf.step(dark), LightCommand::AllOn);
        assert_eq!(clf.state(), BikeState::Idle);
    }

    #[test]
    fn test_braking_dwells_for_num_flash_ticks() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);
        let mut lights = Lights::new(MockPin::default(), MockPin::default());

        clf.step(reading(-0.4, 25.0, 80.0));
        assert_eq!(clf.state(), BikeState::Braking);

        for tick in 1..=NUM_FLASH {
            lights.flash(on_flash_tick(&cells));
            clf.step(NORMAL);
            if tick < NUM_FLASH {
                assert_eq!(clf.state(), BikeState::Braking, "left BRAKING after {} ticks", tick);
            }
        }

        assert_eq!(clf.state(), BikeState::Idle);
        assert_eq!(cells.flashes.get(), 0);
        let (front, rear) = lights.release();
        assert_eq!(rear.toggles, NUM_FLASH);
        assert_eq!(front.toggles, 0);
    }

    #[test]
    fn test_braking_holds_without_ticks() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);

        clf.step(reading(-0.4, 25.0, 80.0));
        for _ in 0..20 {
            clf.step(NORMAL);
        }
        assert_eq!(clf.state(), BikeState::Braking);
    }

    #[test]
    fn test_error_waits_for_cool_down() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);
        let mut lights = Lights::new(MockPin::default(), MockPin::default());
        let hot = reading(0.0, 75.0, 80.0);

        clf.step(hot);
        assert_eq!(clf.state(), BikeState::Error);

        for _ in 0..(NUM_FLASH + 2) {
            lights.flash(on_flash_tick(&cells));
            clf.step(hot);
        }
        assert_eq!(clf.state(), BikeState::Error);
        assert_eq!(cells.flashes.get(), NUM_FLASH + 2);

        clf.step(NORMAL);
        assert_eq!(clf.state(), BikeState::Idle);
        assert_eq!(cells.flashes.get(), 0);

        let (front, rear) = lights.release();
        assert_eq!(front.toggles, NUM_FLASH + 2);
        assert_eq!(rear.toggles, NUM_FLASH + 2);
    }

    #[test]
    fn test_flash_tick_outside_dwell_does_nothing() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);

        assert_eq!(on_flash_tick(&cells), FlashAction::None);
        clf.step(NORMAL);
        assert_eq!(on_flash_tick(&cells), FlashAction::None);
        assert_eq!(cells.flashes.get(), 0);
    }

    #[test]
    fn test_poll_averages_the_window() {
        let cells = ControlCells::new();
        let mut clf: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), &cells);
        // One hard jolt per pair averages to -0.15 g.
        let mut sensors = ScriptedSensors {
            x: [-0.5, 0.2],
            temperature_c: 22.0,
            light_pct: 90.0,
            accel_reads: 0,
        };

        clf.poll(&mut sensors);
        assert_eq!(sensors.accel_reads, 10);
        assert_relative_eq!(clf.last_reading.avg_accel_x_g, -0.15, epsilon = 1e-6);
        assert_eq!(clf.state(), BikeState::Braking);
    }
}
