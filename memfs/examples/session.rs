use memfs::{MemFS, SuperBlock};

pub fn main() -> memfs::Result<()> {
    env_logger::init();

    let mut fs = MemFS::mount(SuperBlock::default())?;
    fs.mkfs(16)?;

    fs.mkdir("/docs")?;
    fs.create("/docs/readme")?;
    fs.symlink("/docs", "/d")?;

    let h = fs.open("/d/readme")?;
    fs.write(h, 0, b"hello from memfs")?;
    let text = fs.read(h, 0, Some(16))?;
    println!("read back: {}", String::from_utf8_lossy(&text));
    fs.close(h)?;

    fs.cd("/d")?;
    println!("in {}", fs.pwd());
    for entry in fs.ls()? {
        println!(
            "{:<14} {:<9} links={} descriptor={} size={}",
            entry.name, entry.mode, entry.reference_count, entry.descriptor_index, entry.size
        );
    }

    let stats = fs.statfs();
    println!(
        "{} of {} blocks free, {} of {} descriptors free",
        stats.free_blocks_count,
        stats.blocks_count,
        stats.free_descriptors_count,
        stats.descriptors_count
    );
    fs.unmount();
    Ok(())
}
