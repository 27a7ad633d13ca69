use env_logger::{Builder, Env};

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    matrix_equation::run()
}
