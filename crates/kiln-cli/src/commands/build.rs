//! The `kiln build` command: load config, run every variant, report.

use miette::{IntoDiagnostic, Result, miette};
use tracing::{error, info};

use kiln_build::{BuildOptions, create_builds, wait_all};
use kiln_config::ConfigDiscovery;

use crate::cli::BuildArgs;

pub async fn execute(args: BuildArgs) -> Result<()> {
    let mut config = ConfigDiscovery::new(&args.root).load().into_diagnostic()?;
    kiln_config::validate(&config).into_diagnostic()?;

    if let Some(name) = &args.name {
        config.builds.retain(|v| v.display_name() == name.as_str());
        if config.builds.is_empty() {
            return Err(miette!("no build variant named {name:?} in the configuration"));
        }
    }

    let options = BuildOptions {
        build_dir: args.build_dir,
    };
    let results = wait_all(create_builds(&config, &options)).await;

    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok(summary) => info!(
                variant = %name,
                files = summary.written.len(),
                output = %summary.output_dir.display(),
                "build finished"
            ),
            Err(err) => {
                failed += 1;
                error!(variant = %name, "build failed: {err}");
            }
        }
    }
    if failed > 0 {
        return Err(miette!("{failed} build variant(s) failed"));
    }
    Ok(())
}
