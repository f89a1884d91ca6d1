//! The frame loop.
//!
//! [`FrameLoop`] owns a [`FrameSource`], a [`LandmarkProvider`] and a [`Surface`] and drives them
//! one frame at a time: read, mirror, detect, classify, label, draw, show, poll for input. Nothing
//! is carried over from one frame to the next except what the provider keeps internally.

use std::time::Duration;

use crate::{
    gui::{Input, Surface},
    hand::{
        fingers::{FingerClassifier, FingerCount},
        provider::LandmarkProvider,
        Hand, Handedness,
    },
    image::Image,
    overlay::OverlayStyle,
    timer::{FpsCounter, Timer},
    video::FrameSource,
};

/// Labels hand `index` of `count` classified hands purely by their position in the list.
///
/// A single hand is `"Hand"`. Of two hands, the first is `"Right Hand"` and the second
/// `"Left Hand"`. This does not look at the hands at all, so the labels are only right if the
/// provider happens to report hands in that order. More hands are numbered from 1.
pub fn label_by_order(index: usize, count: usize) -> String {
    match (count, index) {
        (1, _) => "Hand".to_string(),
        (2, 0) => "Right Hand".to_string(),
        (2, _) => "Left Hand".to_string(),
        _ => format!("Hand {}", index + 1),
    }
}

/// Labels a hand by the handedness its provider reported.
pub fn label_by_handedness(hand: &Hand) -> String {
    match hand.handedness() {
        Some(Handedness::Left) => "Left Hand",
        Some(Handedness::Right) => "Right Hand",
        None => "Hand",
    }
    .to_string()
}

/// How hands are labelled in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Labeling {
    /// [`label_by_order`].
    #[default]
    Order,
    /// [`label_by_handedness`].
    Handedness,
}

impl Labeling {
    pub fn label(self, hand: &Hand, index: usize, count: usize) -> String {
        match self {
            Labeling::Order => label_by_order(index, count),
            Labeling::Handedness => label_by_handedness(hand),
        }
    }
}

/// Result for one hand in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandReport {
    pub label: String,
    pub count: FingerCount,
    /// Where the label was drawn, if the hand has an anchor keypoint.
    pub anchor: Option<(i32, i32)>,
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Classified hands in provider order. Malformed hands are left out.
    pub hands: Vec<HandReport>,
    /// Sum of all counts in `hands`.
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The quit key was pressed or the window was closed.
    Quit,
    /// The frame source returned an error.
    CaptureFailed,
}

/// Returned by [`FrameLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Number of frames that were shown.
    pub frames: u64,
    pub exit: ExitReason,
}

/// Counts fingers in frames from `S`, found by `P`, and shows the result on `D`.
pub struct FrameLoop<S, P, D> {
    source: S,
    provider: P,
    surface: D,
    classifier: FingerClassifier,
    labeling: Labeling,
    quit_key: char,
    poll_timeout: Duration,
    style: OverlayStyle,
    t_capture: Timer,
    t_detect: Timer,
    t_overlay: Timer,
    t_show: Timer,
}

impl<S: FrameSource, P: LandmarkProvider, D: Surface> FrameLoop<S, P, D> {
    pub fn new(source: S, provider: P, surface: D) -> Self {
        Self {
            source,
            provider,
            surface,
            classifier: FingerClassifier::default(),
            labeling: Labeling::default(),
            quit_key: 'q',
            poll_timeout: Duration::from_millis(1),
            style: OverlayStyle::default(),
            t_capture: Timer::new("capture"),
            t_detect: Timer::new("detect"),
            t_overlay: Timer::new("overlay"),
            t_show: Timer::new("show"),
        }
    }

    pub fn classifier(self, classifier: FingerClassifier) -> Self {
        Self { classifier, ..self }
    }

    pub fn labeling(self, labeling: Labeling) -> Self {
        Self { labeling, ..self }
    }

    /// Sets the key that ends the loop. Defaults to `q`.
    pub fn quit_key(self, quit_key: char) -> Self {
        Self { quit_key, ..self }
    }

    /// Sets how long to wait for input after every frame. Defaults to 1 ms.
    pub fn poll_timeout(self, poll_timeout: Duration) -> Self {
        Self {
            poll_timeout,
            ..self
        }
    }

    pub fn style(self, style: OverlayStyle) -> Self {
        Self { style, ..self }
    }

    /// Runs until the user quits or no more frames can be read.
    ///
    /// Errors from the provider or the surface end the loop with `Err`. The source, provider and
    /// surface are dropped before this returns, in every case.
    pub fn run(mut self) -> anyhow::Result<Summary> {
        let mut fps = FpsCounter::new("frame loop");
        let mut frames = 0;

        let exit = loop {
            let mut image = match self.t_capture.time(|| self.source.read()) {
                Ok(image) => image,
                Err(e) => {
                    log::error!("failed to read frame: {:#}", e);
                    break ExitReason::CaptureFailed;
                }
            };

            image.flip_horizontal_in_place();
            let report = self.process(&mut image)?;
            log::trace!("frame {}: {:?}", frames, report);

            self.t_show.time(|| self.surface.show(&image))?;
            frames += 1;

            let inputs = self.surface.poll(self.poll_timeout)?;
            fps.tick_with(self.timers());

            if inputs.iter().any(|input| self.is_quit(*input)) {
                break ExitReason::Quit;
            }
        };

        log::info!("stopped after {} frames ({:?})", frames, exit);
        Ok(Summary { frames, exit })
    }

    /// The loop's own stage timers, followed by those of the source and the provider.
    pub fn timers(&self) -> Vec<&Timer> {
        let mut timers = vec![&self.t_capture, &self.t_detect, &self.t_overlay, &self.t_show];
        timers.extend(self.source.timers());
        timers.extend(self.provider.timers());
        timers
    }

    fn is_quit(&self, input: Input) -> bool {
        match input {
            Input::Key(c) => c == self.quit_key,
            Input::CloseRequested => true,
        }
    }

    /// Detects, classifies and labels the hands in an already mirrored `image` and draws the
    /// overlay onto it.
    pub fn process(&mut self, image: &mut Image) -> anyhow::Result<FrameReport> {
        let hands = self.t_detect.time(|| self.provider.detect(image))?;

        let classified = hands
            .iter()
            .enumerate()
            .filter_map(|(i, hand)| match self.classifier.classify(hand) {
                Ok(count) => Some((hand, count)),
                Err(e) => {
                    log::warn!("skipping hand {}: {}", i, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        let total = classified
            .iter()
            .map(|&(_, count)| u32::from(count))
            .sum();

        let _guard = self.t_overlay.start();
        self.style.draw_total(image, total);
        let connections = self.provider.connections();
        for &(hand, _) in &classified {
            self.style.draw_skeleton(image, hand, connections);
        }

        let num_hands = classified.len();
        let hands = classified
            .iter()
            .enumerate()
            .map(|(i, &(hand, count))| {
                let label = self.labeling.label(hand, i, num_hands);
                let anchor = self.style.draw_label(image, hand, &label, count);
                HandReport {
                    label,
                    count,
                    anchor,
                }
            })
            .collect();

        Ok(FrameReport { hands, total })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use anyhow::bail;

    use crate::{
        hand::{Keypoint, NUM_LANDMARKS},
        image::Color,
    };

    use super::*;

    const TIPS: [usize; 5] = [4, 8, 12, 16, 20];

    /// A hand around `(x, y)` with the first `extended` digits raised.
    fn hand(x: u32, y: u32, extended: usize) -> Hand {
        let mut keypoints = vec![Keypoint::new(x, y); NUM_LANDMARKS];
        for (digit, &tip) in TIPS.iter().enumerate().take(extended) {
            keypoints[tip] = if digit == 0 {
                Keypoint::new(x + 10, y)
            } else {
                Keypoint::new(x, y - 10)
            };
        }
        Hand::new(keypoints)
    }

    #[derive(Default, Clone)]
    struct Drops(Rc<Cell<u32>>);

    impl Drops {
        fn get(&self) -> u32 {
            self.0.get()
        }

        fn inc(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Yields `frames` blank frames, then fails.
    struct Camera {
        frames: usize,
        drops: Drops,
    }

    impl FrameSource for Camera {
        fn read(&mut self) -> anyhow::Result<Image> {
            if self.frames == 0 {
                bail!("camera unplugged");
            }
            self.frames -= 1;
            Ok(Image::new(320, 240))
        }
    }

    impl Drop for Camera {
        fn drop(&mut self) {
            self.drops.inc();
        }
    }

    struct Provider {
        hands: anyhow::Result<Vec<Hand>>,
        drops: Drops,
    }

    impl Provider {
        fn new(hands: Vec<Hand>, drops: &Drops) -> Self {
            Self {
                hands: Ok(hands),
                drops: drops.clone(),
            }
        }
    }

    impl LandmarkProvider for Provider {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
            match &self.hands {
                Ok(hands) => Ok(hands.clone()),
                Err(e) => bail!("{}", e),
            }
        }
    }

    impl Drop for Provider {
        fn drop(&mut self) {
            self.drops.inc();
        }
    }

    /// Reports `input` when polled after the `at`-th shown frame.
    struct Screen {
        input: Option<(u64, Input)>,
        shown: Rc<Cell<u64>>,
        drops: Drops,
    }

    impl Surface for Screen {
        fn show(&mut self, _: &Image) -> anyhow::Result<()> {
            self.shown.set(self.shown.get() + 1);
            Ok(())
        }

        fn poll(&mut self, _: Duration) -> anyhow::Result<Vec<Input>> {
            match self.input {
                Some((at, input)) if at == self.shown.get() => Ok(vec![input]),
                _ => Ok(Vec::new()),
            }
        }
    }

    impl Drop for Screen {
        fn drop(&mut self) {
            self.drops.inc();
        }
    }

    struct Fixture {
        camera: Drops,
        provider: Drops,
        screen: Drops,
        shown: Rc<Cell<u64>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                camera: Drops::default(),
                provider: Drops::default(),
                screen: Drops::default(),
                shown: Rc::default(),
            }
        }

        fn frame_loop(
            &self,
            frames: usize,
            hands: Vec<Hand>,
            input: Option<(u64, Input)>,
        ) -> FrameLoop<Camera, Provider, Screen> {
            FrameLoop::new(
                Camera {
                    frames,
                    drops: self.camera.clone(),
                },
                Provider::new(hands, &self.provider),
                Screen {
                    input,
                    shown: self.shown.clone(),
                    drops: self.screen.clone(),
                },
            )
        }

        fn assert_released_once(&self) {
            assert_eq!(self.camera.get(), 1);
            assert_eq!(self.provider.get(), 1);
            assert_eq!(self.screen.get(), 1);
        }
    }

    #[test]
    fn labels_by_order() {
        assert_eq!(label_by_order(0, 1), "Hand");
        assert_eq!(label_by_order(0, 2), "Right Hand");
        assert_eq!(label_by_order(1, 2), "Left Hand");
        assert_eq!(label_by_order(0, 3), "Hand 1");
        assert_eq!(label_by_order(2, 3), "Hand 3");
    }

    #[test]
    fn labels_by_handedness() {
        let h = hand(0, 0, 0);
        assert_eq!(label_by_handedness(&h), "Hand");
        assert_eq!(
            label_by_handedness(&h.clone().with_handedness(Handedness::Left)),
            "Left Hand"
        );
        assert_eq!(
            Labeling::Handedness.label(&h.with_handedness(Handedness::Right), 1, 2),
            "Right Hand"
        );
    }

    #[test]
    fn no_hands() {
        let fixture = Fixture::new();
        let mut frame_loop = fixture.frame_loop(1, Vec::new(), None);
        let mut image = Image::new(320, 240);
        let report = frame_loop.process(&mut image).unwrap();
        assert_eq!(report, FrameReport::default());
        // The panel is drawn even without hands.
        assert_eq!(image.get(21, 21), Some(OverlayStyle::default().panel_color));
    }

    #[test]
    fn two_hands_are_summed() {
        let fixture = Fixture::new();
        let hands = vec![hand(100, 150, 3), hand(220, 160, 2)];
        let mut frame_loop = fixture.frame_loop(1, hands, None);
        let report = frame_loop.process(&mut Image::new(320, 240)).unwrap();

        assert_eq!(report.total, 5);
        assert_eq!(
            report.hands,
            vec![
                HandReport {
                    label: "Right Hand".into(),
                    count: hand_count(3),
                    anchor: Some((80, 120)),
                },
                HandReport {
                    label: "Left Hand".into(),
                    count: hand_count(2),
                    anchor: Some((200, 130)),
                },
            ]
        );
    }

    fn hand_count(n: usize) -> FingerCount {
        FingerClassifier::default().classify(&hand(0, 20, n)).unwrap()
    }

    #[test]
    fn malformed_hand_is_skipped() {
        let fixture = Fixture::new();
        let short = Hand::new(vec![Keypoint::new(5, 5); 10]);
        let hands = vec![short, hand(100, 100, 4)];
        let mut frame_loop = fixture.frame_loop(1, hands, None);
        let report = frame_loop.process(&mut Image::new(320, 240)).unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.hands.len(), 1);
        assert_eq!(report.hands[0].label, "Hand");
    }

    #[test]
    fn quits_after_rendering_frame() {
        let fixture = Fixture::new();
        let frame_loop = fixture.frame_loop(10, vec![hand(50, 50, 1)], Some((3, Input::Key('q'))));
        let summary = frame_loop.run().unwrap();

        assert_eq!(
            summary,
            Summary {
                frames: 3,
                exit: ExitReason::Quit
            }
        );
        assert_eq!(fixture.shown.get(), 3);
        fixture.assert_released_once();
    }

    #[test]
    fn custom_quit_key() {
        let fixture = Fixture::new();
        let frame_loop = fixture
            .frame_loop(5, Vec::new(), Some((1, Input::Key('q'))))
            .quit_key('x');
        let summary = frame_loop.run().unwrap();

        // `q` is ignored, so the loop runs until the camera gives out.
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.exit, ExitReason::CaptureFailed);
        fixture.assert_released_once();
    }

    #[test]
    fn close_request_quits() {
        let fixture = Fixture::new();
        let frame_loop = fixture.frame_loop(5, Vec::new(), Some((1, Input::CloseRequested)));
        let summary = frame_loop.run().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.exit, ExitReason::Quit);
        fixture.assert_released_once();
    }

    #[test]
    fn capture_failure_ends_run() {
        let fixture = Fixture::new();
        let summary = fixture.frame_loop(2, Vec::new(), None).run().unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.exit, ExitReason::CaptureFailed);
        assert_eq!(fixture.shown.get(), 2);
        fixture.assert_released_once();

        let fixture = Fixture::new();
        let summary = fixture.frame_loop(0, Vec::new(), None).run().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(fixture.shown.get(), 0);
        fixture.assert_released_once();
    }

    #[test]
    fn provider_error_releases_resources() {
        let fixture = Fixture::new();
        let mut frame_loop = fixture.frame_loop(5, Vec::new(), None);
        frame_loop.provider.hands = Err(anyhow::anyhow!("inference failed"));
        let err = frame_loop.run().unwrap_err();
        assert!(err.to_string().contains("inference failed"), "{err}");
        assert_eq!(fixture.shown.get(), 0);
        fixture.assert_released_once();
    }

    struct TimedProvider {
        t_infer: Timer,
    }

    impl LandmarkProvider for TimedProvider {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
            self.t_infer.time(|| Ok(vec![hand(100, 100, 2)]))
        }

        fn timers(&self) -> Vec<&Timer> {
            vec![&self.t_infer]
        }
    }

    struct TimedCamera {
        t_decode: Timer,
    }

    impl FrameSource for TimedCamera {
        fn read(&mut self) -> anyhow::Result<Image> {
            Ok(self.t_decode.time(|| Image::new(320, 240)))
        }

        fn timers(&self) -> Vec<&Timer> {
            vec![&self.t_decode]
        }
    }

    #[test]
    fn stage_timers_include_source_and_provider() {
        let fixture = Fixture::new();
        let mut frame_loop = FrameLoop::new(
            TimedCamera {
                t_decode: Timer::new("decode"),
            },
            TimedProvider {
                t_infer: Timer::new("infer"),
            },
            Screen {
                input: None,
                shown: fixture.shown.clone(),
                drops: fixture.screen.clone(),
            },
        );
        let mut image = frame_loop.source.read().unwrap();
        frame_loop.process(&mut image).unwrap();

        let names = frame_loop
            .timers()
            .iter()
            .map(|timer| timer.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 6, "{names:?}");
        assert!(names[0].starts_with("capture: 0x"), "{names:?}");
        assert!(names[1].starts_with("detect: 1x"), "{names:?}");
        assert!(names[4].starts_with("decode: 1x"), "{names:?}");
        assert!(names[5].starts_with("infer: 1x"), "{names:?}");
    }

    /// Reports one hand if the frame it gets is mirrored.
    struct MirrorProbe;

    impl LandmarkProvider for MirrorProbe {
        fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>> {
            if image.get(image.width() - 1, 0) == Some(Color::RED) {
                Ok(vec![hand(100, 100, 5)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct MarkedCamera;

    impl FrameSource for MarkedCamera {
        fn read(&mut self) -> anyhow::Result<Image> {
            let mut image = Image::new(320, 240);
            image.set(0, 0, Color::RED);
            Ok(image)
        }
    }

    struct QuitImmediately;

    impl Surface for QuitImmediately {
        fn show(&mut self, image: &Image) -> anyhow::Result<()> {
            // The label of the detected hand was drawn onto the shown frame.
            assert!((0..image.height())
                .any(|y| (0..image.width()).any(|x| image.get(x, y) == Some(Color::YELLOW))));
            Ok(())
        }

        fn poll(&mut self, _: Duration) -> anyhow::Result<Vec<Input>> {
            Ok(vec![Input::Key('q')])
        }
    }

    #[test]
    fn frames_are_mirrored_before_detection() {
        let summary = FrameLoop::new(MarkedCamera, MirrorProbe, QuitImmediately)
            .run()
            .unwrap();
        assert_eq!(summary.frames, 1);
    }
}
