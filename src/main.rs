fn main() -> anyhow::Result<()> {
    cubescan_lib::run()
}
