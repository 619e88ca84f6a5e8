use posestream::prelude::*;
use posestream::test_utils::{assert_approx_eq, assert_pose_approx_eq, line_poses};
use posestream::pose_at;
use ps_catmull_rom::{CatmullRomParams, CatmullRomResampleFilter};
use ps_deadzone::DeadzoneFilter;
use ps_moving_average::MovingAverageFilter;
use ps_trail::{ChainOptions, HelixTracker};
use std::cell::RefCell;
use std::rc::Rc;

fn script(poses: Vec<Option<Pose>>) -> impl PoseTracker {
    let mut poses = poses.into_iter();
    move || poses.next().flatten()
}

#[test]
fn deadzone_then_average_smooths_a_ramp() {
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let chain = Pipeline::new()
        .filter(DeadzoneFilter::with_radius(0.02).unwrap())
        .filter(MovingAverageFilter::with_radius(1).unwrap())
        .into_sink(collector.clone());

    let raw = [0.0, 0.03, 0.05, 0.08, 0.1];
    let ticks = raw.len();
    let poses = raw.iter().map(|x| Some(pose_at!(*x, 0.0, 0.0))).collect();
    let mut driver = TickDriver::new(script(poses)).with_sink(chain);
    driver.run(ticks).unwrap();
    driver.shutdown().unwrap();

    let collector = collector.borrow();
    let xs: Vec<f32> = collector.poses().iter().map(|p| p.position.x).collect();
    assert_eq!(xs.len(), 4);
    assert!(xs.windows(2).all(|w| w[0] < w[1]));
    // first output is the first pose past the deadzone, last is pulled back by the window
    assert_approx_eq(xs[0], 0.03, 1e-6);
    assert!(xs[3] < 0.1 && xs[3] > 0.08);
    assert_eq!(collector.opens(), 1);
    assert_eq!(collector.closes(), 1);
}

#[test]
fn resampling_keeps_the_end_points_of_short_sessions() {
    for count in [2usize, 3] {
        let collector = Rc::new(RefCell::new(PoseCollector::new()));
        let resample = CatmullRomResampleFilter::new(CatmullRomParams::default()).unwrap();
        let chain = Pipeline::new().filter(resample).into_sink(collector.clone());
        let poses = line_poses(Vec3::ZERO, Vec3::new(0.05, 0.02, 0.0), count);
        let mut driver =
            TickDriver::new(script(poses.iter().copied().map(Some).collect())).with_sink(chain);
        driver.run(count + 1).unwrap();

        let collector = collector.borrow();
        assert_eq!(collector.closes(), 1);
        if count == 2 {
            assert_eq!(collector.poses(), &poses[..]);
        } else {
            assert!(collector.len() > count);
        }
        assert_eq!(collector.first(), poses.first());
        assert_eq!(collector.last(), poses.last());
    }
}

#[test]
fn full_chain_balances_sessions_across_tracking_gaps() {
    let options = ChainOptions {
        deadzone: Some(0.001),
        average: Some(2),
        simplify: Some(0.02),
        resample: Some(200.0),
        ribbon: true,
        ..Default::default()
    };
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let trail = Rc::new(RefCell::new(PointBuffer::new(16).unwrap()));
    let sinks: Vec<Box<dyn PoseSink>> = vec![Box::new(collector.clone()), Box::new(trail.clone())];
    let chain = options.build().unwrap().fan_out(sinks);

    let tracker = HelixTracker::new(0.2, 0.05, 0.05).with_gaps(20, 5);
    let mut driver = TickDriver::new(tracker).with_sink(chain);
    let outcomes = driver.run(100).unwrap();
    driver.shutdown().unwrap();

    let sessions = outcomes.iter().filter(|o| **o == TickOutcome::Opened).count();
    assert_eq!(sessions, 4);
    let collector = collector.borrow();
    assert_eq!(collector.opens(), 4);
    assert_eq!(collector.closes(), 4);
    assert!(!collector.is_open());
    assert!(collector.poses().iter().all(|p| p.is_finite()));
    assert!(collector.len() > 40);
    assert_eq!(trail.borrow().len(), 16);
    assert_eq!(trail.borrow().latest(), collector.last().map(|p| p.position));
}

#[test]
fn gate_waits_for_consecutive_hits() {
    let mut options = ChainOptions {
        gate_radius: Some(0.5),
        ..Default::default()
    };
    options.add_override(r#"gate={"threshold": 4}"#).unwrap();
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let chain = options.build().unwrap().into_sink(collector.clone());

    let tracker = HelixTracker::new(0.2, 0.0, 0.1);
    let mut driver = TickDriver::new(tracker).with_sink(chain);
    driver.run(10).unwrap();
    driver.shutdown().unwrap();
    assert_eq!(collector.borrow().len(), 7);
}

#[test]
fn relative_stage_uses_the_configured_reference() {
    let mut options = ChainOptions {
        relative: true,
        ..Default::default()
    };
    options.add_override(r#"delta={"x": 0.2}"#).unwrap();
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let chain = options.build().unwrap().into_sink(collector.clone());

    let tracker = HelixTracker::new(0.2, 0.0, 0.1);
    let first = tracker.pose_at(0);
    let mut driver = TickDriver::new(tracker).with_sink(chain);
    driver.tick().unwrap();
    driver.shutdown().unwrap();

    let expected = Pose::from_position(Vec3::new(0.2, 0.0, 0.0))
        .inverse()
        .compose(&first);
    assert_pose_approx_eq(&collector.borrow()[0], &expected, 1e-6);
    assert!(collector.borrow()[0].position.length() < 1e-6);
}

#[test]
fn strict_chain_rejects_a_receive_before_open() {
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let mut chain = ChainOptions {
        average: Some(1),
        ..Default::default()
    }
    .build()
    .unwrap()
    .into_sink(collector.clone());
    let err = chain.receive(Pose::IDENTITY).unwrap_err();
    assert!(err.is_protocol_violation());

    let mut lenient = ChainOptions {
        average: Some(1),
        lenient: true,
        ..Default::default()
    }
    .build()
    .unwrap()
    .into_sink(collector.clone());
    assert!(lenient.receive(Pose::IDENTITY).is_ok());
    assert!(collector.borrow().is_empty());
}
