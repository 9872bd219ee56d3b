use argh::FromArgs;
use std::path::PathBuf;

use pcdroi::{
    color::Palette,
    config::{LoaderConfig, RoiGenerationConfig},
    loader::{FileSource, PcdLoader},
    session::ViewerSession,
};

#[derive(FromArgs)]
/// Decode a PCD file, color it by height and classify it against regions of interest
struct Args {
    /// path to the PCD file
    #[argh(option)]
    pcd_path: PathBuf,

    /// point size passed through to the renderer
    #[argh(option, default = "1.0")]
    point_size: f32,

    /// keep one record out of `stride`
    #[argh(option)]
    stride: Option<usize>,

    /// color palette: rainbow, cooltowarm, blackbody or grayscale
    #[argh(option)]
    palette: Option<Palette>,

    /// paint points inside a region with the highlight color
    #[argh(switch)]
    highlight: bool,

    /// number of random regions of interest to generate
    #[argh(option)]
    generate_rois: Option<usize>,

    /// seed for the region generator
    #[argh(option)]
    seed: Option<u64>,

    /// path to a JSON configuration file
    #[argh(option)]
    config: Option<PathBuf>,

    /// write the last decoded result as JSON to this path
    #[argh(option)]
    output: Option<PathBuf>,

    /// number of consecutive loads of the file
    #[argh(option, default = "1")]
    frames: usize,
}

fn build_config(args: &Args) -> Result<LoaderConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => LoaderConfig::default(),
    };

    // command line flags override the configuration file
    if let Some(stride) = args.stride {
        config.decoder.stride = stride;
    }
    if let Some(palette) = args.palette {
        config.decoder.palette = palette;
    }
    if args.highlight {
        config.decoder.highlight_rois = true;
    }
    if args.generate_rois.is_some() || args.seed.is_some() {
        let generation = config.generate_rois.get_or_insert_with(RoiGenerationConfig::default);
        if let Some(count) = args.generate_rois {
            generation.count = count;
        }
        generation.seed = args.seed.or(generation.seed);
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();
    let config = build_config(&args)?;
    log::debug!("configuration: {config:?}");

    let loader = PcdLoader::new(FileSource::new()).with_config(config);
    let mut session = ViewerSession::new(args.pcd_path.to_string_lossy()).with_point_size(args.point_size);

    let mut last = None;
    for _ in 0..args.frames.max(1) {
        let result = session.load_next(&loader).await?;
        println!(
            "frame #{}: {} points ({} scanned), z in [{}, {}], {} regions",
            session.frame_id(),
            result.point_count,
            result.points_scanned,
            result.height_range.min,
            result.height_range.max,
            result.roi_outlines.len(),
        );
        last = Some(result);
    }

    if let Some(camera) = session.camera() {
        println!(
            "camera target: {:?}, zoom: {:.3}",
            camera.target, camera.zoom
        );
    }

    if let (Some(path), Some(result)) = (&args.output, &last) {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), result)?;
        println!("Wrote result to {}", path.display());
    }

    Ok(())
}
