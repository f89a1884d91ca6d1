use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    process,
};

use fingercount::{
    app::{ExitReason, FrameLoop},
    config::Config,
    gui,
    hand::provider::HandLandmarker,
    video::webcam::Webcam,
};

const HINT: &str =
    "make sure the ONNX models are present and the V4L2/graphics libraries are installed";

enum Outcome {
    Finished(ExitReason),
    NoCamera,
}

fn run() -> anyhow::Result<Outcome> {
    let config = Config::from_env()?;
    log::debug!("{:?}", config);

    let webcam = match Webcam::open(config.webcam_options()) {
        Ok(webcam) => webcam,
        Err(e) => {
            eprintln!("could not open a webcam: {:#}", e);
            return Ok(Outcome::NoCamera);
        }
    };

    let landmarker = HandLandmarker::load(
        &config.palm_model,
        &config.landmark_model,
        config.landmarker.clone(),
    )?;
    let window = gui::Window::new("Finger Counter");

    let summary = FrameLoop::new(webcam, landmarker, window)
        .labeling(config.labeling)
        .quit_key(config.quit_key)
        .run()?;
    Ok(Outcome::Finished(summary.exit))
}

fn main() {
    fingercount::init_logger!();

    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(Outcome::Finished(exit))) => log::debug!("exiting ({:?})", exit),
        Ok(Ok(Outcome::NoCamera)) => {}
        Ok(Err(e)) => {
            eprintln!("error: {:#}", e);
            eprintln!("{HINT}");
            process::exit(1);
        }
        Err(_payload) => {
            // The panic hook has printed the message already. 101 mimics libstd.
            eprintln!("{HINT}");
            process::exit(101);
        }
    }
}
