//! The inspector's commands: thin formatting layers over the mounted
//! storage. The command set is a build-time table consulted by the CLI.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};

use crate::blockdev::BlockSource;
use crate::catalog::{sign_extend, CatalogEntry};
use crate::crc::Crc16;
use crate::error::Error;
use crate::geometry::{Encoding, SECTOR_BYTES};
use crate::hexdump::hexdump;
use crate::names::{parse_filename, DfsContext, SurfaceSelector, VolumeSelector, WildcardMatcher};
use crate::storage::StorageConfiguration;

type Handler = fn(&mut StorageConfiguration, &DfsContext, &[String]) -> Result<()>;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    handler: Handler,
}

impl Command {
    pub fn invoke(
        &self,
        storage: &mut StorageConfiguration,
        ctx: &DfsContext,
        args: &[String],
    ) -> Result<()> {
        (self.handler)(storage, ctx, args)
    }
}

/// All commands, in help order. `args[0]` is always the command name.
pub const COMMANDS: &[Command] = &[
    Command {
        name: "cat",
        usage: "cat [drive]\nDisplay the disc catalogue, as the *CAT command would.\n",
        description: "display the disc catalogue",
        handler: cmd_cat,
    },
    Command {
        name: "info",
        usage: "info wildcard\nShow name, lock state, addresses, length and start sector of matching files.\n\
                Load and execution addresses are sign-extended from 18 to 24 bits, so\n\
                3F1900 is shown as FF1900, for consistency with Acorn DFS.\n",
        description: "display information about a file (for example load address)",
        handler: cmd_info,
    },
    Command {
        name: "type",
        usage: "type filename\nDisplay the contents of a file as text, like *TYPE.\n",
        description: "display the contents of a file as text",
        handler: cmd_type,
    },
    Command {
        name: "dump",
        usage: "dump filename\nDisplay the contents of a file in hex and ASCII.\n",
        description: "show the contents of a file in hexadecimal",
        handler: cmd_dump,
    },
    Command {
        name: "list",
        usage: "list filename\nDisplay the contents of a file with numbered lines.\n",
        description: "display a file with line numbers",
        handler: cmd_list,
    },
    Command {
        name: "free",
        usage: "free [drive]\nThe used/free space shown reflects the position of the last file on the disc.\n\
                Using *COMPACT or a similar tool on the disc may free up additional space.\n",
        description: "display information about a disc's free space",
        handler: cmd_free,
    },
    Command {
        name: "space",
        usage: "space [drive...]\nDisplays a list of spaces between files. More than one drive can be specified.\n",
        description: "show spaces between files",
        handler: cmd_space,
    },
    Command {
        name: "sector-map",
        usage: "sector-map [drive]\nDisplays a map of which sectors store which files.\n",
        description: "show where each file is stored on disc",
        handler: cmd_sector_map,
    },
    Command {
        name: "show-titles",
        usage: "show-titles [drive...]\nShow the titles of the discs in the specified drives.\n\
                If no drive argument is specified, show all titles.\n",
        description: "display disc titles",
        handler: cmd_show_titles,
    },
    Command {
        name: "extract-files",
        usage: "extract-files destination-directory\nExtract all files from the current drive, with an archive .inf file each.\n",
        description: "extract all the files from the disc",
        handler: cmd_extract_files,
    },
    Command {
        name: "extract-unused",
        usage: "extract-unused destination-directory\nWrite each span of unused sectors to a file named after its first sector,\n\
                such as unused_1E4.bin.\n",
        description: "extract a copy of unused areas of the disc",
        handler: cmd_extract_unused,
    },
    Command {
        name: "help",
        usage: "help [command]...\nShow a command list, or the usage of the named commands.\n",
        description: "explain how to use one or more commands",
        handler: cmd_help,
    },
];

pub fn find_command(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.name == name)
}

fn volume_from_args(ctx: &DfsContext, args: &[String]) -> Result<VolumeSelector> {
    match args.len() {
        0 | 1 => Ok(ctx.current_volume),
        2 => {
            let (vol, used) = VolumeSelector::parse(&args[1]).map_err(|e| anyhow!(e))?;
            if used != args[1].len() {
                bail!("trailing junk after drive number {}", args[1]);
            }
            Ok(vol)
        }
        _ => bail!("at most one command-line argument is needed"),
    }
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn encoding_label(encoding: Option<Encoding>) -> &'static str {
    match encoding {
        Some(Encoding::Mfm) => "MFM",
        _ => "FM",
    }
}

fn cmd_cat(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let vol = volume_from_args(ctx, args)?;
    let mounted = storage.mount(&vol)?;
    let volume = mounted.volume()?;
    let catalog = volume.root();

    print!("{}", catalog.title());
    if let Some(seq) = catalog.sequence_number() {
        print!(" ({seq:02x}) {}", encoding_label(mounted.fs.geometry().encoding));
    }
    println!();
    let opt = catalog.boot_setting();
    println!(
        "Drive {}            Option {} ({opt})",
        vol.surface,
        opt.value()
    );
    println!(
        "Dir. :{}.{}          Lib. :0.$",
        vol.surface, ctx.current_directory
    );
    println!();

    let mut entries = catalog.entries();
    let sort_dir = |dir: char| -> (u8, char) {
        if dir == ctx.current_directory {
            (0, '\0')
        } else {
            (1, dir.to_ascii_lowercase())
        }
    };
    entries.sort_by(|l, r| {
        sort_dir(l.directory())
            .cmp(&sort_dir(r.directory()))
            .then_with(|| {
                l.name()
                    .to_ascii_lowercase()
                    .cmp(&r.name().to_ascii_lowercase())
            })
    });

    let mut left_column = true;
    let mut printed_gap = false;
    for (i, entry) in entries.iter().enumerate() {
        if entry.directory() != ctx.current_directory && !printed_gap {
            if i > 0 {
                print!("{}", if left_column { "\n" } else { "\n\n" });
            }
            left_column = true;
            printed_gap = true;
        }
        if !left_column {
            print!("{:6}", "");
        }
        print!(" ");
        if entry.directory() != ctx.current_directory {
            print!(" {}.", entry.directory());
        } else {
            print!("   ");
        }
        print!("{:<7}", entry.name());
        print!("{}", if entry.is_locked() { " L" } else { "  " });
        if !left_column {
            println!();
        }
        left_column = !left_column;
    }
    println!();
    Ok(())
}

fn cmd_info(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("info: please give a file name or wildcard specifying which files you want to see information about");
    }
    if args.len() > 2 {
        bail!("info: please specify no more than one argument");
    }
    let matcher = WildcardMatcher::compile(ctx, &args[1])
        .map_err(|e| anyhow!("Not a valid pattern ({e}): {}", args[1]))?;
    let vol = matcher.volume();
    let mounted = storage.mount(&vol)?;
    let catalog = mounted.volume()?.root();
    for entry in catalog.entries() {
        if matcher.matches(vol, entry.directory(), &entry.name()) {
            println!("{entry}");
        }
    }
    Ok(())
}

/// Look up `name_arg` and return the matching entry along with its body.
fn read_file_body(
    storage: &mut StorageConfiguration,
    ctx: &DfsContext,
    name_arg: &str,
) -> Result<(CatalogEntry, Vec<u8>)> {
    let parsed = parse_filename(ctx, name_arg).map_err(|e| anyhow!(e))?;
    let mut mounted = storage.mount(&parsed.vol)?;
    let volume = mounted.fs.volume(parsed.vol.subvolume)?;
    let entry = volume
        .root()
        .find(&parsed)
        .ok_or_else(|| anyhow!("{name_arg}: not found"))?
        .clone();
    let mut body = Vec::with_capacity(entry.file_length() as usize);
    let total = volume.file_storage_space();
    let mut region = volume.data_region(&mut *mounted.device);
    entry.visit_file_body(&mut region, total, &mut |piece| {
        body.extend_from_slice(piece);
        Ok(())
    })?;
    Ok((entry, body))
}

fn file_name_arg<'a>(name: &str, args: &'a [String]) -> Result<&'a str> {
    if args.len() < 2 {
        bail!("{name}: please give a file name");
    }
    if args.len() > 2 {
        // The Beeb ignores additional arguments; we reject them instead.
        bail!("{name}: just one file name is needed");
    }
    Ok(&args[1])
}

fn cmd_type(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let (_, body) = read_file_body(storage, ctx, file_name_arg("type", args)?)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for &b in &body {
        if b == 0x0D {
            out.write_all(b"\n")?;
        } else {
            out.write_all(&[b])?;
        }
    }
    Ok(())
}

fn cmd_list(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let (_, body) = read_file_body(storage, ctx, file_name_arg("list", args)?)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut line_number = 1u32;
    let mut start_of_line = true;
    for &b in &body {
        if start_of_line {
            write!(out, "{line_number:4} ")?;
            line_number += 1;
            start_of_line = false;
        }
        if b == 0x0D {
            out.write_all(b"\n")?;
            start_of_line = true;
        } else {
            out.write_all(&[b])?;
        }
    }
    if !start_of_line {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn cmd_dump(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let (_, body) = read_file_body(storage, ctx, file_name_arg("dump", args)?)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    hexdump(&mut out, &body)?;
    Ok(())
}

fn cmd_free(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let vol = volume_from_args(ctx, args)?;
    let mounted = storage.mount(&vol)?;
    let catalog = mounted.volume()?.root();

    let entries = catalog.entries();
    let mut sectors_used: u32 = 2;
    for entry in &entries {
        let last = entry.start_sector() + entry.file_length().div_ceil(SECTOR_BYTES as u32);
        sectors_used = sectors_used.max(last);
    }
    let files_used = entries.len();
    let files_free = catalog.max_file_count() - files_used;
    let sectors_free = catalog.total_sectors().saturating_sub(sectors_used);

    let show = |files: usize, sectors: u32, desc: &str| {
        println!(
            "{files:02} Files {sectors:03X} Sectors {:>7} Bytes {desc}",
            group_digits(u64::from(sectors) * SECTOR_BYTES as u64)
        );
    };
    show(files_free, sectors_free, "Free");
    show(files_used, sectors_used, "Used");
    Ok(())
}

fn cmd_space(storage: &mut StorageConfiguration, ctx: &DfsContext, args: &[String]) -> Result<()> {
    let mut selected = Vec::new();
    if args.len() < 2 {
        selected.push(ctx.current_volume);
    } else {
        for arg in &args[1..] {
            let (vol, used) = VolumeSelector::parse(arg).map_err(|e| anyhow!(e))?;
            if used != arg.len() {
                bail!("trailing junk after drive number {arg}");
            }
            selected.push(vol);
        }
    }

    let mut free_space = Vec::new();
    for vol in &selected {
        let mounted = storage.mount(vol)?;
        let volume = mounted.volume()?;
        let catalog = volume.root();
        let mut extents: Vec<(u32, u32)> = catalog
            .entries()
            .iter()
            .map(|e| (e.start_sector(), e.last_sector()))
            .collect();
        extents.sort_unstable();

        let mut gaps: Vec<u32> = Vec::new();
        let mut prev_end = catalog.disc_format().data_sectors_reserved_for_catalog();
        for (start, last) in extents {
            if start < prev_end {
                return Err(Error::BadFileSystem(
                    "catalog entries are out of order".to_string(),
                )
                .into());
            }
            if start > prev_end {
                gaps.push(start - prev_end);
            }
            prev_end = last + 1;
        }
        let total = catalog.total_sectors();
        if total > prev_end {
            gaps.push(total - prev_end);
        }

        println!("Gap sizes on disc {vol}:");
        let rendered: Vec<String> = gaps.iter().map(|g| format!("{g:03X}")).collect();
        println!("{}", rendered.join(" "));
        let free: u32 = gaps.iter().sum();
        println!("\nTotal space free = {free:X} sectors");
        free_space.push((*vol, free));
    }
    if selected.len() > 1 {
        let mut total_free = 0u32;
        for (vol, free) in &free_space {
            println!("Total space free in volume {vol:>4} = {free:04X} sectors");
            total_free += free;
        }
        println!("Total space free in all volumes = {total_free:04X} sectors");
    }
    Ok(())
}

fn surface_from_args(ctx: &DfsContext, args: &[String]) -> Result<SurfaceSelector> {
    match args.len() {
        0 | 1 => {
            if ctx.current_volume.subvolume.is_some() {
                bail!("please specify only a drive number, not also a volume letter");
            }
            Ok(ctx.current_volume.surface)
        }
        2 => {
            let (surface, used) = SurfaceSelector::parse(&args[1]).map_err(|e| anyhow!(e))?;
            if used != args[1].len() {
                bail!("trailing junk after drive number {}", args[1]);
            }
            Ok(surface)
        }
        _ => bail!("at most one command-line argument is needed"),
    }
}

fn cmd_sector_map(
    storage: &mut StorageConfiguration,
    ctx: &DfsContext,
    args: &[String],
) -> Result<()> {
    let surface = surface_from_args(ctx, args)?;
    let (fs, _device) = storage.mount_fs(surface)?;
    let map = fs.sector_map(surface);

    // Keep each track an integer number of output lines.
    let max_col = match fs.geometry().sectors {
        18 => 6,
        16 => 4,
        _ => 5,
    };
    println!("Sector:");
    println!(" (dec): Name of file occupying each sector");
    let mut column = 0;
    for sec in 0..fs.disc_sector_count() {
        if column == 0 {
            if sec > 0 {
                println!();
            }
            print!("{sec:06}: ");
        }
        print!("{:<12} ", map.at(u64::from(sec)).unwrap_or("-"));
        column = (column + 1) % max_col;
    }
    println!();
    Ok(())
}

fn cmd_show_titles(
    storage: &mut StorageConfiguration,
    _ctx: &DfsContext,
    args: &[String],
) -> Result<()> {
    let surfaces: Vec<SurfaceSelector> = if args.len() > 1 {
        let mut todo = Vec::new();
        for arg in &args[1..] {
            let (surface, used) = SurfaceSelector::parse(arg).map_err(|e| anyhow!(e))?;
            if used != arg.len() {
                bail!("trailing junk after drive number {arg}");
            }
            todo.push(surface);
        }
        todo
    } else {
        // Skip connected-but-unformatted surfaces (empty MMB slots).
        storage
            .occupied_surfaces()
            .into_iter()
            .filter(|s| storage.drive_format(*s).is_some())
            .collect()
    };

    for surface in surfaces {
        let (fs, _device) = storage.mount_fs(surface)?;
        for subvolume in fs.subvolumes() {
            let vol = VolumeSelector {
                surface,
                subvolume,
            };
            println!("{vol}: {}", fs.volume(subvolume)?.root().title());
        }
    }
    Ok(())
}

/// The archive sidecar line written next to each extracted file.
pub fn inf_line(entry: &CatalogEntry, crc: u16) -> String {
    format!(
        "{}.{} {:06X} {:06X} {:06X} {}CRC={:04X}\n",
        entry.directory(),
        entry.name(),
        sign_extend(entry.load_address()),
        sign_extend(entry.exec_address()),
        entry.file_length(),
        if entry.is_locked() { "Locked " } else { "" },
        crc
    )
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut f = File::create(path).map_err(|e| Error::file_io(path, e))?;
    f.write_all(contents).map_err(|e| Error::file_io(path, e))?;
    Ok(())
}

fn dest_dir_arg<'a>(name: &str, args: &'a [String]) -> Result<&'a Path> {
    if args.len() < 2 {
        bail!("{name}: please specify the destination directory");
    }
    if args.len() > 2 {
        bail!("{name}: just one argument (the destination directory) is needed");
    }
    Ok(Path::new(&args[1]))
}

fn cmd_extract_files(
    storage: &mut StorageConfiguration,
    ctx: &DfsContext,
    args: &[String],
) -> Result<()> {
    let dest_dir = dest_dir_arg("extract-files", args)?;
    let mut mounted = storage.mount(&ctx.current_volume)?;
    let volume = mounted.fs.volume(ctx.current_volume.subvolume)?;
    let entries: Vec<CatalogEntry> = volume.root().entries().into_iter().cloned().collect();
    let total = volume.file_storage_space();
    for entry in entries {
        let mut body = Vec::with_capacity(entry.file_length() as usize);
        {
            let mut region = volume.data_region(&mut *mounted.device);
            entry.visit_file_body(&mut region, total, &mut |piece| {
                body.extend_from_slice(piece);
                Ok(())
            })?;
        }
        let mut crc = Crc16::new_tape();
        crc.update(&body);

        // Files outside the current directory keep a D. prefix; the .inf
        // records the DFS directory either way.
        let base = if entry.directory() == ctx.current_directory {
            entry.name()
        } else {
            format!("{}.{}", entry.directory(), entry.name())
        };
        let body_path = dest_dir.join(&base);
        write_file(&body_path, &body)?;
        let inf_path = PathBuf::from(format!("{}.inf", body_path.display()));
        write_file(&inf_path, inf_line(&entry, crc.get()).as_bytes())?;
    }
    Ok(())
}

fn cmd_extract_unused(
    storage: &mut StorageConfiguration,
    ctx: &DfsContext,
    args: &[String],
) -> Result<()> {
    if ctx.current_volume.subvolume.is_some() {
        bail!("extract-unused: please specify only a drive number, not also a volume letter");
    }
    let dest_dir = dest_dir_arg("extract-unused", args)?;
    let surface = ctx.current_volume.surface;
    let (fs, device) = storage.mount_fs(surface)?;
    let mut map = fs.sector_map(surface);

    // A sentinel past the last sector flushes the final free span.
    let last_sec = fs.disc_sector_count();
    map.add_other(u64::from(last_sec), ":::end");
    let mut count = 0u32;
    let mut begin: Option<u32> = None;
    for sec in 0..=last_sec {
        if map.at(u64::from(sec)).is_some() {
            if let Some(first) = begin.take() {
                let mut span = Vec::with_capacity(((sec - first) as usize) * SECTOR_BYTES);
                for s in first..sec {
                    match device.read_block(u64::from(s))? {
                        Some(buf) => span.extend_from_slice(&buf),
                        None => break,
                    }
                }
                let path = dest_dir.join(format!("unused_{first:03X}.bin"));
                write_file(&path, &span)?;
                count += 1;
            }
        } else if begin.is_none() {
            begin = Some(sec);
        }
    }
    println!("{count} files were written to {}", dest_dir.display());
    Ok(())
}

fn cmd_help(_storage: &mut StorageConfiguration, _ctx: &DfsContext, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        println!("usage: beebdfs [global-options] command [arguments]");
        println!("Global options are described by beebdfs --help.");
        println!("Commands:");
        for command in COMMANDS {
            println!("  {:<16} {}", command.name, command.description);
        }
        println!("For details, use help followed by a command name.");
        return Ok(());
    }
    for name in &args[1..] {
        match find_command(name) {
            Some(command) => print!("usage: {}", command.usage),
            None => bail!("unknown command {name}"),
        }
    }
    Ok(())
}
