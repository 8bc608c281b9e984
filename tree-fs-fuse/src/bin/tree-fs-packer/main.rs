mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;
use cli::Cli;
use tree_fs::{BlockDevice, Filesystem, Inode, SECTOR_SIZE};
use tree_fs_fuse::BlockFile;
use vfs::InodeKind;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let block_file: Arc<dyn BlockDevice> = Arc::new(BlockFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.out)?;
        fd.set_len(cli.sectors as u64 * SECTOR_SIZE as u64)?;

        fd
    })));

    let fs = Filesystem::format(block_file, cli.sectors);
    let root = fs.root_dir();

    for entry in fs::read_dir(&cli.source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .expect("source file name is not UTF-8");

        let mut host_file = File::open(entry.path())?;
        let mut data = Vec::new();
        host_file.read_to_end(&mut data)?;

        log::info!("packing: {name} ({} bytes)", data.len());

        let sector = fs.free_map().allocate(1).expect("image is full");
        Inode::create(&fs, sector, 0, InodeKind::File).expect("image is full");
        root.add(&fs, &name, sector).expect("duplicated file name");

        let inode = fs.open_inode(sector);
        assert_eq!(inode.write_at(&fs, 0, &data), data.len(), "image is full");
        fs.close_inode(&inode);
    }

    root.close(&fs);
    fs.shutdown();

    Ok(())
}
