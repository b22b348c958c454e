// src/scanner/dedup.rs

use crate::models::{FileDescriptor, FolderNode};
use itertools::Itertools;

/// 深度优先展开目录树: 先本目录文件，再依次展开子目录。
fn walk<'a>(node: &'a FolderNode, out: &mut Vec<&'a FileDescriptor>) {
    out.extend(node.files.iter());
    for child in &node.children {
        walk(child, out);
    }
}

/// 展开整棵树并按 id 去重，先出现的条目保留
pub fn collect_all_files(root: &FolderNode) -> Vec<FileDescriptor> {
    let mut flat = Vec::new();
    walk(root, &mut flat);
    dedup_files(flat.into_iter().cloned())
}

/// 对任意文件序列按 id 去重 (跨分区合并时使用)
pub fn dedup_files<I>(files: I) -> Vec<FileDescriptor>
where
    I: IntoIterator<Item = FileDescriptor>,
{
    files
        .into_iter()
        .unique_by(|file| file.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, path: &str) -> FileDescriptor {
        FileDescriptor {
            id: id.into(),
            logical_path: path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_seen_wins_depth_first() {
        let tree = FolderNode {
            files: vec![file("1", "root/a")],
            children: vec![
                FolderNode {
                    files: vec![file("2", "root/x/b"), file("1", "root/x/a-copy")],
                    children: vec![FolderNode {
                        files: vec![file("3", "root/x/y/c")],
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                FolderNode {
                    files: vec![file("3", "root/z/c-copy"), file("4", "root/z/d")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let files = collect_all_files(&tree);
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
        assert!(files.len() <= tree.total_file_count());
        assert_eq!(files[0].logical_path, "root/a");
        assert_eq!(files[2].logical_path, "root/x/y/c");
    }

    #[test]
    fn test_empty_tree() {
        assert!(collect_all_files(&FolderNode::default()).is_empty());
    }
}
