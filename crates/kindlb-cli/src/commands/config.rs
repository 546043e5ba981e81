use kindlb_core::KindlbConfig;

/// Print the effective configuration, defaults filled in.
pub fn show(config: &KindlbConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
