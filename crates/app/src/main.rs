//! Demo driver for the walk-mesh crates.
//! Stands in for a real game loop: loads a resource, places an agent, and
//! advances it by a fixed per-frame displacement, hopping seams as needed.

use anyhow::{Context, Result, bail};
use asset::WalkMeshes;
use walkmesh::{Vec3, vec3};

struct Options {
    file: String,
    mesh: Option<String>,
    start: Vec3,
    step: Vec3,
    frames: u32,
}

fn parse_vec3(value: &str) -> Option<Vec3> {
    let mut parts = value.split(',').map(|part| part.trim().parse::<f32>());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Some(vec3(x, y, z)),
        _ => None,
    }
}

fn parse_args() -> Result<Options> {
    // Accept: --file=path [--mesh=name] [--start=x,y,z] [--step=x,y,z] [--frames=n]
    let mut file = None;
    let mut mesh = None;
    let mut start = Vec3::ZERO;
    let mut step = vec3(0.1, 0.0, 0.0);
    let mut frames = 60;

    for arg in std::env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--file=") {
            file = Some(val.to_owned());
        } else if let Some(val) = arg.strip_prefix("--mesh=") {
            mesh = Some(val.to_owned());
        } else if let Some(val) = arg.strip_prefix("--start=") {
            start = parse_vec3(val)
                .with_context(|| format!("Bad --start value '{val}', expected x,y,z"))?;
        } else if let Some(val) = arg.strip_prefix("--step=") {
            step = parse_vec3(val)
                .with_context(|| format!("Bad --step value '{val}', expected x,y,z"))?;
        } else if let Some(val) = arg.strip_prefix("--frames=") {
            frames = val
                .parse()
                .with_context(|| format!("Bad --frames value '{val}'"))?;
        } else {
            eprintln!("[warn] Unknown argument '{}', ignoring.", arg);
        }
    }

    let Some(file) = file else {
        bail!("Usage: app --file=mesh.wm [--mesh=name] [--start=x,y,z] [--step=x,y,z] [--frames=n]");
    };
    Ok(Options {
        file,
        mesh,
        start,
        step,
        frames,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;
    let meshes = WalkMeshes::load_from_path(&options.file)?;

    let name = match &options.mesh {
        Some(name) => name.as_str(),
        None => {
            let mut names: Vec<_> = meshes.names().collect();
            names.sort_unstable();
            *names
                .first()
                .context("Walk mesh resource contains no meshes")?
        }
    };
    let mesh = meshes.lookup(name)?;
    log::info!("Walking on '{}' ({} triangles)", name, mesh.triangles().len());

    let mut at = mesh.nearest_walk_point(options.start);
    let mut heading = options.step;
    log::info!("Agent placed at {:?}", mesh.to_world(&at));

    for frame in 0..options.frames {
        let walk = mesh.walk(&at, heading);
        at = walk.end;
        heading = walk.rotation * heading;
        log::info!("frame {:>4}: position {:?}", frame, mesh.to_world(&at));
        if walk.blocked {
            log::info!("Reached the edge of the walkable surface; stopping.");
            break;
        }
    }

    Ok(())
}
