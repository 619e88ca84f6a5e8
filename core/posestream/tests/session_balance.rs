use posestream::prelude::*;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Holds back one sample and releases it on close.
struct Delay {
    held: Option<Pose>,
}

impl PoseFilter for Delay {
    fn name(&self) -> &str {
        "delay"
    }

    fn open(&mut self) -> PsResult<()> {
        self.held = None;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        out.extend(self.held.replace(pose));
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        out.extend(self.held.take());
        Ok(())
    }
}

proptest! {
    #[test]
    fn opens_match_closes_for_any_tracking_pattern(tracked in proptest::collection::vec(any::<bool>(), 0..64)) {
        let collector = Rc::new(RefCell::new(PoseCollector::new()));
        let chain = Pipeline::new()
            .filter(Delay { held: None })
            .filter(Delay { held: None })
            .into_sink(collector.clone());

        let mut pattern = tracked.clone().into_iter();
        let mut tick = 0.0f32;
        let mut driver = TickDriver::new(move || {
            tick += 1.0;
            pattern
                .next()
                .unwrap_or(false)
                .then(|| Pose::from_position(Vec3::new(tick, 0.0, 0.0)))
        })
        .with_sink(chain);

        driver.run(tracked.len()).unwrap();
        driver.shutdown().unwrap();

        let collector = collector.borrow();
        prop_assert_eq!(collector.opens(), collector.closes());
        prop_assert!(!collector.is_open());
        // delays flush on close, so nothing is lost
        prop_assert_eq!(collector.len(), tracked.iter().filter(|t| **t).count());
        let xs: Vec<f32> = collector.poses().iter().map(|p| p.position.x).collect();
        prop_assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }
}
