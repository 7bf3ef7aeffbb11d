use std::path::{Path, PathBuf};

use ferry::app::command::{self, Privilege};
use ferry::domain::model::Tools;
use insta::assert_snapshot;

fn sources() -> Vec<PathBuf> {
    vec!["/a/f1.txt".into(), "/a/f2.txt".into()]
}

#[test]
fn sync_to_remote_renders() {
    let tools = Tools::default();
    let rendered = tools
        .transfer(false, Privilege::User)
        .command(&sources(), "/scp:host:/backup/")
        .to_string();
    assert_snapshot!(rendered, @"rsync -az --info=progress2 '/a/f1.txt' '/a/f2.txt' 'host:/backup/'");
}

#[test]
fn elevated_mirror_renders() {
    let tools = Tools::default();
    let rendered = tools
        .transfer(true, Privilege::Elevated)
        .command(&sources(), "/ssh:me@box:/srv/dest dir")
        .to_string();
    assert_snapshot!(rendered, @r"sudo rsync -az --info=progress2 --delete '/a/f1.txt' '/a/f2.txt' 'me@box:/srv/dest\ dir'");
}

#[test]
fn archive_operations_render() {
    let tools = Tools::default();
    let created = command::archive_create(&tools.archive_create, &sources(), "/b/bundle.zip");
    assert_snapshot!(created.to_string(), @"zip -r '/b/bundle.zip' 'f1.txt' 'f2.txt'");

    let extracted = command::archive_extract(&tools.archive_extract, Path::new("/a/archive.zip"));
    assert_snapshot!(extracted.to_string(), @"unzip -o '/a/archive.zip' -d 'archive'");
}

#[test]
fn size_renders() {
    let tools = Tools::default();
    let rendered = command::size(&tools.size, &[PathBuf::from("/a/it's here")]).to_string();
    assert_snapshot!(rendered, @r"du -sch '/a/it'\''s here'");
}
