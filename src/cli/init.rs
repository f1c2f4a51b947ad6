use crate::cli::InitArgs;
use crate::config::Config;
use tracing::info;

pub fn execute(args: InitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite",
            args.output.display()
        );
    }

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config)?;
    std::fs::write(&args.output, yaml)?;

    info!("Wrote default config to {}", args.output.display());
    println!("Wrote {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragline.yaml");
        std::fs::write(&path, "version: 1\n").unwrap();

        let result = execute(InitArgs {
            output: path.clone(),
            force: false,
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 1\n");
    }

    #[test]
    fn written_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragline.yaml");

        execute(InitArgs {
            output: path.clone(),
            force: false,
        })
        .unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieve.rrf_k, 60.0);
    }
}
