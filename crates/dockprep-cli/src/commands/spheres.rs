use crate::cli::SpheresArgs;
use crate::error::{CliError, Result};
use dockprep::core::io::traits::TextFile;
use dockprep::core::models::sphere::SphereSet;
use dockprep::engine::clustering::{ClusteredSpheres, cluster_spheres};
use dockprep::engine::config::KMeansConfig;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn run(args: SpheresArgs) -> Result<()> {
    let set = SphereSet::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    info!("Read {} spheres from {:?}", set.len(), &args.input);

    let assignment = cluster_spheres(&set, args.k, args.seed, &KMeansConfig::default())
        .map_err(|e| CliError::Argument(e.to_string()))?;
    let clustered = ClusteredSpheres::new(&set, assignment);

    if args.split {
        for cluster in 0..args.k {
            let path = split_path(&args.output, cluster);
            write_with(&path, |w| clustered.write_cluster_to(cluster, w))?;
        }
    } else {
        write_with(&args.output, |w| clustered.write_merged_to(w))?;
    }

    println!("Number of Clusters : {}", args.k);
    for (cluster, size) in clustered.cluster_sizes().iter().enumerate() {
        println!("\tspheres in cluster {} : {}", cluster, size);
    }
    Ok(())
}

fn split_path(prefix: &Path, cluster: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".{}.sph", cluster));
    PathBuf::from(name)
}

fn write_with<E>(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> std::result::Result<(), E>) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer).map_err(|e| {
        CliError::Other(anyhow::Error::new(e).context(format!("Failed to write {}", path.display())))
    })?;
    writer.flush()?;
    Ok(())
}
