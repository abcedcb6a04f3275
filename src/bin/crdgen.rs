use kube::CustomResourceExt;
use pulsetic_operator::crd::{Account, Monitor};

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Account::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&Monitor::crd())?);
    Ok(())
}
