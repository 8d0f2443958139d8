use tello_teleop::{
    env,
    tello::TelloSdk,
    video::FfmpegDecoder,
    window::WindowSurface,
    ControlConfig, ControlLoop,
};

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(*env::ENV_TELLO_LOG)
        .init();

    let config = ControlConfig::from_env();
    let (width, height) = config.frame_size;

    let tello = TelloSdk::new()?;
    let decoder = FfmpegDecoder::new(width, height);
    let window = WindowSurface::new(
        "Tello video stream",
        width as usize,
        height as usize,
        config.tick_rate,
    )?;

    tracing::info!("arrows: move, w/s: up/down, a/d: yaw, t: takeoff, l: land, esc: quit");
    let mut session = ControlLoop::new(config, tello, decoder, window)?;
    let reason = session.run()?;
    tracing::info!(?reason, "session ended");
    Ok(())
}
