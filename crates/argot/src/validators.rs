//! Positional-argument validators for [`Command::args`](crate::Command::args).

pub fn no_args() -> impl Fn(&[String]) -> Result<(), String> {
    |args| {
        if args.is_empty() {
            Ok(())
        } else {
            Err("accepts no arguments".to_string())
        }
    }
}

pub fn exact_args(n: usize) -> impl Fn(&[String]) -> Result<(), String> {
    move |args| {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("accepts {n} arg(s), received {}", args.len()))
        }
    }
}

pub fn minimum_n_args(n: usize) -> impl Fn(&[String]) -> Result<(), String> {
    move |args| {
        if args.len() >= n {
            Ok(())
        } else {
            Err(format!("requires at least {n} arg(s), only received {}", args.len()))
        }
    }
}

pub fn maximum_n_args(n: usize) -> impl Fn(&[String]) -> Result<(), String> {
    move |args| {
        if args.len() <= n {
            Ok(())
        } else {
            Err(format!("accepts at most {n} arg(s), received {}", args.len()))
        }
    }
}

pub fn range_args(min: usize, max: usize) -> impl Fn(&[String]) -> Result<(), String> {
    move |args| {
        if (min..=max).contains(&args.len()) {
            Ok(())
        } else {
            Err(format!(
                "accepts between {min} and {max} arg(s), received {}",
                args.len()
            ))
        }
    }
}
