use super::*;

#[test]
fn points_parse_from_pairs() {
    assert_eq!(parse_point("10,20.5"), Ok(Point::new(10.0, 20.5)));
    assert_eq!(parse_point(" 1 , 2 "), Ok(Point::new(1.0, 2.0)));
    assert!(parse_point("10").is_err());
    assert!(parse_point("a,b").is_err());
    assert!(parse_point("inf,1").is_err());
}

#[test]
fn dims_parse_and_reject_zero() {
    assert_eq!(parse_dims("1920x1080"), Ok(Dims::new(1920, 1080)));
    assert_eq!(parse_dims("390X844"), Ok(Dims::new(390, 844)));
    assert!(parse_dims("0x100").is_err());
    assert!(parse_dims("100").is_err());
}

#[test]
fn roles_parse() {
    assert_eq!(parse_role("tutor"), Ok(Role::Tutor));
    assert!(parse_role("admin").is_err());
}

#[test]
fn draw_arguments_parse() {
    let cli = Cli::try_parse_from(["tutorboard", "draw", "geo", "--from", "0,0", "--to", "100,50", "--canvas", "800x600"])
        .expect("draw args should parse");
    let Command::Draw(args) = cli.command else {
        panic!("expected draw");
    };
    assert_eq!(args.target.room, "geo");
    assert_eq!(args.target.canvas, Dims::new(800, 600));
    assert_eq!(args.to, Point::new(100.0, 50.0));
    assert_eq!(args.color, "#000000");
}

#[test]
fn watch_defaults_to_student_without_output() {
    let cli = Cli::try_parse_from(["tutorboard", "watch", "geo"]).expect("watch args should parse");
    let Command::Watch(args) = cli.command else {
        panic!("expected watch");
    };
    assert_eq!(args.role, Role::Student);
    assert!(args.out.is_none());
    assert_eq!(args.canvas, Dims::new(1280, 720));
}
