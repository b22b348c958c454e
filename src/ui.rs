// src/ui.rs

use crate::{constants, models::FolderNode, symbols, utils};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    io::{self, Write},
    time::Duration,
};

pub fn print_header(title: &str) {
    println!("\n{}", "═".repeat(constants::UI_WIDTH));
    println!(" {}", title.cyan().bold());
    println!("{}", "═".repeat(constants::UI_WIDTH));
}

pub fn print_sub_header(title: &str) {
    println!("\n--- {} ---", title.bold());
}

pub fn info(message: &str) {
    println!("{} {}", *symbols::INFO, message);
}

pub fn warn(message: &str) {
    println!("{} {}", *symbols::WARN, message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", *symbols::ERROR, message.red());
}

pub fn box_message(title: &str, content: &[&str], color_func: fn(ColoredString) -> ColoredString) {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", color_func(title.bold()));
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    for line in content {
        println!("  {}", line);
    }
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));
}

pub fn prompt(message: &str, default: Option<&str>) -> io::Result<String> {
    let default_str = default.map_or(String::new(), |d| format!(" (默认: {})", d));
    print!("\n>>> {}{}: ", message, default_str);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();
    if input.is_empty() {
        Ok(default.unwrap_or("").to_string())
    } else {
        Ok(input)
    }
}

pub fn confirm(question: &str, default_yes: bool) -> bool {
    let options = if default_yes { "(Y/n)" } else { "(y/N)" };
    loop {
        match prompt(
            &format!("{} {} (按 {} 取消)", question, options, *symbols::CTRL_C),
            None,
        ) {
            Ok(choice) => match choice.to_lowercase().as_str() {
                "y" => return true,
                "n" => return false,
                "" => return default_yes,
                _ => println!("{}", "无效输入，请输入 'y' 或 'n'。".red()),
            },
            Err(_) => return false,
        }
    }
}

pub fn selection_menu(
    options: &[String],
    title: &str,
    instructions: &str,
    default_choice: &str,
) -> String {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", title.cyan().bold());
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));

    let pad = options.len().to_string().len();
    for (i, option) in options.iter().enumerate() {
        println!(
            "  [{}] {}",
            format!("{:<pad$}", i + 1, pad = pad).yellow(),
            option
        );
    }

    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {} (按 {} 可取消)", instructions, *symbols::CTRL_C);
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));

    prompt("请输入你的选择", Some(default_choice)).unwrap_or_default()
}

pub fn prompt_hidden(message: &str) -> io::Result<String> {
    print!("\n>>> {}: ", message);
    io::stdout().flush()?;
    rpassword::read_password()
}

/// 显示菜单并返回被选中项的下标
pub fn get_user_choices_from_menu(options: &[String], title: &str, default_choice: &str) -> Vec<usize> {
    if options.is_empty() {
        return vec![];
    }
    let user_input = selection_menu(options, title, "支持格式: 1, 3, 2-4, all", default_choice);
    utils::parse_selection_indices(&user_input, options.len())
}

/// 按文件数量显示的总进度条
pub fn new_tasks_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{prefix:7.bold.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} ({percent:>3}%) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    let pbar = ProgressBar::new(total);
    pbar.set_style(style);
    pbar.set_prefix(prefix.to_string());
    pbar.enable_steady_tick(Duration::from_millis(100));
    pbar
}

/// 单个文件的字节进度条，总大小未知时显示为 spinner
pub fn new_bytes_progress_bar(total: Option<u64>, prefix: &str) -> ProgressBar {
    let (pbar, template) = match total {
        Some(total) => (
            ProgressBar::new(total),
            "{prefix:7.bold.cyan} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{prefix:7.bold.cyan} {spinner} {bytes} ({bytes_per_sec}) {msg}",
        ),
    };
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pbar.set_style(style);
    pbar.set_prefix(prefix.to_string());
    pbar
}

/// 以树状形式打印扫描结果
pub fn print_tree(root: &FolderNode) {
    println!(
        "{} {} ({} 个文件夹, {} 个文件)",
        "■".cyan(),
        root.name.bold(),
        root.total_folder_count(),
        root.total_file_count()
    );
    print_children(root, "");
}

fn print_children(node: &FolderNode, indent: &str) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, next_indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        let label = if child.name.is_empty() { child.path.as_str() } else { child.name.as_str() };
        println!(
            "{}{}{} {}",
            indent,
            branch,
            utils::truncate_text(label, constants::FILENAME_TRUNCATE_LENGTH).cyan(),
            format!("[{} 个文件]", child.total_file_count()).dimmed()
        );
        print_children(child, &format!("{}{}", indent, next_indent));
    }
}
