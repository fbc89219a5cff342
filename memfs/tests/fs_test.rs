use memfs::{DescriptorMode, LsEntry, MemFS, MemFSError, SuperBlock};

const DATA_SIZE: usize = memfs::layout::DATA_SIZE;

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

fn formatted(descriptors: usize) -> MemFS {
  init_logging();
  let mut fs = MemFS::mount(SuperBlock::default()).unwrap();
  fs.mkfs(descriptors).unwrap();
  fs
}

fn descriptor_of(fs: &mut MemFS, path: &str) -> usize {
  let cwd = fs.pwd();
  fs.cd(path).unwrap();
  let index = fs.current_directory();
  fs.cd(&cwd).unwrap();
  index
}

#[test]
fn can_write_and_read_back_a_file() {
  let mut fs = formatted(10);
  fs.create("/a").unwrap();
  let h = fs.open("/a").unwrap();
  fs.write(h, 0, b"hello").unwrap();

  assert_eq!(fs.read(h, 0, Some(5)).unwrap(), b"hello");
  let listing = fs.ls().unwrap();
  assert_eq!(listing[0].size, DATA_SIZE);
  assert_eq!(fs.fstat(listing[0].descriptor_index).unwrap().mode(), DescriptorMode::File);
}

#[test]
fn truncate_keeps_prefix_and_block_granular_size() {
  let mut fs = formatted(10);
  fs.create("/a").unwrap();
  let h = fs.open("/a").unwrap();
  fs.write(h, 0, b"hello").unwrap();
  fs.truncate("/a", 2).unwrap();

  assert_eq!(fs.read(h, 0, Some(2)).unwrap(), b"he");
  let rest = fs.read(h, 2, None).unwrap();
  assert_eq!(rest.len(), DATA_SIZE - 2);
  assert!(rest.iter().all(|&b| b == 0));
}

#[test]
fn write_spanning_block_boundary() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();
  fs.write(h, DATA_SIZE - 3, b"boundary").unwrap();

  assert_eq!(fs.ls().unwrap()[0].size, 2 * DATA_SIZE);
  assert_eq!(fs.read(h, DATA_SIZE - 3, Some(8)).unwrap(), b"boundary");
  assert!(fs.read(h, 0, Some(DATA_SIZE - 3)).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn reading_past_the_end_is_out_of_range() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();
  fs.write(h, 0, b"x").unwrap();

  match fs.read(h, 10, Some(DATA_SIZE)) {
    Err(MemFSError::OutOfRange(_)) => (),
    other => panic!("expected out of range, got {:?}", other),
  }
  assert!(fs.read(h, DATA_SIZE, None).unwrap().is_empty());
}

#[test]
fn growing_truncate_reads_zeros() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  fs.truncate("f", 100).unwrap();

  let h = fs.open("f").unwrap();
  let content = fs.read(h, 0, None).unwrap();
  assert_eq!(content.len(), 2 * DATA_SIZE);
  assert!(content.iter().all(|&b| b == 0));
}

#[test]
fn shrinking_truncate_zeroes_tail_of_last_block() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();
  let pattern: Vec<u8> = (1..=150).collect();
  fs.write(h, 0, &pattern).unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 64 - 1 - 3);

  fs.truncate("f", 70).unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 64 - 1 - 2);
  assert_eq!(fs.read(h, 0, Some(70)).unwrap(), &pattern[..70]);
  assert!(fs.read(h, 70, None).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn directories_and_listing() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  fs.create("/d/f").unwrap();
  fs.cd("/d").unwrap();

  assert_eq!(fs.pwd(), "/d");
  let listing = fs.ls().unwrap();
  assert_eq!(
    listing,
    vec![LsEntry {
      name: "f".to_string(),
      mode: DescriptorMode::File,
      reference_count: 1,
      descriptor_index: 2,
      size: 0,
    }]
  );

  fs.cd("..").unwrap();
  assert_eq!(fs.pwd(), "/");
  assert_eq!(fs.current_directory(), 0);
}

#[test]
fn cd_through_symlink_lands_in_target() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  fs.symlink("/d", "/s").unwrap();

  let through_link = descriptor_of(&mut fs, "/s");
  assert_eq!(through_link, descriptor_of(&mut fs, "/d"));
  fs.cd("/s").unwrap();
  assert_eq!(fs.pwd(), "/d");
}

#[test]
fn relative_symlink_resolves_from_its_directory() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  fs.mkdir("/d/e").unwrap();
  fs.symlink("e", "/d/l").unwrap();
  fs.create("/d/e/f").unwrap();

  fs.cd("/d/l").unwrap();
  assert_eq!(fs.pwd(), "/d/e");
  fs.cd("/").unwrap();
  let h = fs.open("/d/l/f").unwrap();
  fs.write(h, 0, b"via link").unwrap();
}

#[test]
fn open_follows_symlink_to_file() {
  let mut fs = formatted(10);
  fs.create("/a").unwrap();
  fs.symlink("/a", "/s").unwrap();

  let h = fs.open("/s").unwrap();
  fs.write(h, 0, b"data").unwrap();
  let direct = fs.open("/a").unwrap();
  assert_eq!(fs.read(direct, 0, Some(4)).unwrap(), b"data");
}

#[test]
fn hard_links_share_blocks_until_last_unlink() {
  let mut fs = formatted(10);
  fs.create("/a").unwrap();
  let h = fs.open("/a").unwrap();
  fs.write(h, 0, b"shared").unwrap();
  fs.close(h).unwrap();

  fs.link("/a", "/b").unwrap();
  let index = fs.ls().unwrap()[0].descriptor_index;
  assert_eq!(fs.fstat(index).unwrap().reference_count(), 2);

  fs.unlink("/a").unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 62);
  let h = fs.open("/b").unwrap();
  assert_eq!(fs.read(h, 0, Some(6)).unwrap(), b"shared");

  fs.unlink("/b").unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 63);
  assert!(!fs.fstat(index).unwrap().is_used());
  assert!(fs.ls().unwrap().is_empty());
}

#[test]
fn last_unlink_invalidates_open_handles() {
  let mut fs = formatted(10);
  fs.create("/a").unwrap();
  let h = fs.open("/a").unwrap();
  fs.unlink("/a").unwrap();
  assert!(matches!(fs.write(h, 0, b"x"), Err(MemFSError::NotFound(_))));
}

#[test]
fn directories_cannot_be_linked_or_unlinked() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  assert!(matches!(fs.link("/d", "/e"), Err(MemFSError::TypeMismatch(_))));
  assert!(matches!(fs.unlink("/d"), Err(MemFSError::TypeMismatch(_))));
}

#[test]
fn failed_write_allocates_nothing() {
  init_logging();
  let mut fs = MemFS::mount(SuperBlock::new().with_block_count(4)).unwrap();
  fs.mkfs(4).unwrap();
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();

  assert_eq!(
    fs.write(h, 0, &[1; 4 * DATA_SIZE]),
    Err(MemFSError::ResourceExhausted("no free blocks"))
  );
  assert_eq!(fs.ls().unwrap()[0].size, 0);
  assert_eq!(fs.statfs().free_blocks_count, 3);

  fs.write(h, 0, &[1; 3 * DATA_SIZE]).unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 0);
}

#[test]
fn directory_holds_four_entries() {
  let mut fs = formatted(10);
  for name in &["a", "b", "c", "d"] {
    fs.create(name).unwrap();
  }
  assert_eq!(
    fs.create("e"),
    Err(MemFSError::ResourceExhausted("directory full"))
  );
  assert_eq!(fs.statfs().free_descriptors_count, 5);
}

#[test]
fn descriptor_table_exhaustion() {
  let mut fs = formatted(2);
  fs.create("a").unwrap();
  assert_eq!(
    fs.create("b"),
    Err(MemFSError::ResourceExhausted("no free descriptors"))
  );
}

#[test]
fn duplicate_names_are_refused() {
  let mut fs = formatted(10);
  fs.create("a").unwrap();
  assert_eq!(fs.mkdir("a"), Err(MemFSError::AlreadyExists("a".to_string())));
}

#[test]
fn long_names_are_truncated() {
  let mut fs = formatted(10);
  fs.create("So very big file name").unwrap();
  assert_eq!(fs.ls().unwrap()[0].name, "So very big fi");
  fs.open("So very big file name").unwrap();
  fs.open("So very big fi").unwrap();
}

#[test]
fn closing_twice_is_not_found() {
  let mut fs = formatted(10);
  fs.create("a").unwrap();
  let h = fs.open("a").unwrap();
  fs.close(h).unwrap();
  assert!(matches!(fs.close(h), Err(MemFSError::NotFound(_))));
}

#[test]
fn symlink_cycle_is_detected() {
  let mut fs = formatted(10);
  fs.symlink("/b", "/a").unwrap();
  fs.symlink("/a", "/b").unwrap();

  assert_eq!(fs.cd("/a"), Err(MemFSError::CycleOrTooDeep(50)));
  assert_eq!(fs.open("/a"), Err(MemFSError::CycleOrTooDeep(50)));
}

#[test]
fn symlink_target_must_fit_in_a_block() {
  let mut fs = formatted(10);
  let target = "/".repeat(65);
  assert_eq!(fs.symlink(&target, "/s"), Err(MemFSError::TooLarge(65)));
}

#[test]
fn rmdir_refuses_non_empty_and_busy_directories() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  fs.create("/d/f").unwrap();
  assert_eq!(fs.rmdir("/d"), Err(MemFSError::NotEmpty("/d".to_string())));

  fs.unlink("/d/f").unwrap();
  fs.cd("/d").unwrap();
  assert_eq!(fs.rmdir("/d"), Err(MemFSError::Busy("/d".to_string())));

  fs.cd("/").unwrap();
  fs.rmdir("/d").unwrap();
  assert_eq!(fs.statfs().free_blocks_count, 63);
  assert!(matches!(fs.cd("/d"), Err(MemFSError::NotFound(_))));
}

#[test]
fn file_operations_on_directories_are_type_mismatch() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  let h = fs.open("/d").unwrap();
  assert!(matches!(fs.write(h, 0, b"x"), Err(MemFSError::TypeMismatch(_))));
  assert!(matches!(fs.truncate("/d", 1), Err(MemFSError::TypeMismatch(_))));
  fs.create("f").unwrap();
  assert!(matches!(fs.cd("/f"), Err(MemFSError::TypeMismatch(_))));
}

#[test]
fn mkfs_reformats_everything() {
  let mut fs = formatted(10);
  fs.mkdir("/d").unwrap();
  fs.cd("/d").unwrap();
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();

  fs.mkfs(3).unwrap();
  assert_eq!(fs.pwd(), "/");
  assert!(fs.ls().unwrap().is_empty());
  assert!(matches!(fs.close(h), Err(MemFSError::NotFound(_))));

  let stats = fs.statfs();
  assert_eq!(stats.descriptors_count, 3);
  assert_eq!(stats.free_descriptors_count, 2);
  assert_eq!(stats.free_blocks_count, 63);
}

#[test]
fn invalid_geometry_is_refused() {
  let mut fs = MemFS::mount(SuperBlock::default()).unwrap();
  assert!(matches!(fs.mkfs(0), Err(MemFSError::InvalidArgument(_))));
  assert_eq!(fs.ls(), Err(MemFSError::NotFormatted));
  assert!(MemFS::mount(SuperBlock::new().with_block_count(0)).is_err());
}

#[test]
fn huge_read_range_is_out_of_range() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();
  fs.write(h, 0, b"abc").unwrap();

  assert!(matches!(fs.read(h, 1, Some(usize::MAX)), Err(MemFSError::OutOfRange(_))));
  assert!(matches!(fs.read(h, usize::MAX, Some(1)), Err(MemFSError::OutOfRange(_))));
}

#[test]
fn write_at_huge_offset_changes_nothing() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let h = fs.open("f").unwrap();
  let before = fs.statfs();

  assert!(matches!(fs.write(h, usize::MAX, b"x"), Err(MemFSError::OutOfRange(_))));
  assert_eq!(
    fs.write(h, usize::MAX - 1, b"x"),
    Err(MemFSError::ResourceExhausted("no free blocks"))
  );
  assert_eq!(fs.statfs(), before);
  assert_eq!(fs.ls().unwrap()[0].size, 0);
}

#[test]
fn truncate_to_huge_size_changes_nothing() {
  let mut fs = formatted(10);
  fs.create("f").unwrap();
  let before = fs.statfs();

  assert_eq!(
    fs.truncate("f", usize::MAX),
    Err(MemFSError::ResourceExhausted("no free blocks"))
  );
  assert_eq!(fs.statfs(), before);
  assert_eq!(fs.ls().unwrap()[0].size, 0);
}
