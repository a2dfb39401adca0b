use keyhole::{capture, stream, template, ComposeError, Composer, Handler, Key, Keyhole, KeyholeKind, SnapshotPool, Template};

mod templates_;
use templates_::{board, counter, init_logging, items, journal, profile, todos, Board, Counter, Group, Journal, Profile, Todos};

#[test]
fn counter_markup() {
	init_logging();
	let render = capture(&counter, &Counter { clicks: 3 }, &SnapshotPool::default()).unwrap();
	assert_eq!(render.snapshot.markup(), r#"<button kh-onclick="0">Clicks: <!--kh:1-->3<!--/kh--></button>"#);
	assert_eq!(render.snapshot.root_length(), 5);
	assert_eq!(render.handlers.len(), 1);
	assert!(render.handlers.get("0").is_some());
}

#[test]
fn profile_markup() {
	init_logging();
	let state = Profile {
		highlighted: true,
		show_badge: true,
		..Profile::default()
	};
	let render = capture(&profile, &state, &SnapshotPool::default()).unwrap();
	assert_eq!(
		render.snapshot.markup(),
		concat!(
			r#"<div class="card highlight" kh-class="0">"#,
			r#"<!--kh:1--><h1><!--kh:1.0-->Ada<!--/kh--></h1><meter><!--kh:1.1-->0.50<!--/kh--></meter><!--/kh-->"#,
			r#"<!--kh:2--><!--kh:2[if]--><span>badge</span><!--/kh--><!--/kh-->"#,
			"</div>",
		)
	);
}

#[test]
fn stream_matches_capture_counter() {
	test_stream_matches_capture(counter, Counter { clicks: 12 });
}

#[test]
fn stream_matches_capture_todos() {
	test_stream_matches_capture(todos, Todos::of(&["one", "two", "<three>"]));
}

#[test]
fn stream_matches_capture_empty_list() {
	test_stream_matches_capture(todos, Todos::default());
}

#[test]
fn stream_matches_capture_profile() {
	test_stream_matches_capture(profile, Profile::default());
	test_stream_matches_capture(
		profile,
		Profile {
			name: r#"Bob "the <builder>""#.to_owned(),
			highlighted: true,
			show_badge: true,
			score: 1.0 / 3.0,
		},
	);
}

#[test]
fn stream_matches_capture_board() {
	test_stream_matches_capture(
		board,
		Board {
			groups: vec![
				Group {
					id: "g1",
					title: "First".to_owned(),
					entries: items(&["a", "b"]),
				},
				Group {
					id: "g2",
					title: "Second".to_owned(),
					entries: vec![],
				},
			],
		},
	);
}

#[test]
fn stream_matches_capture_journal() {
	test_stream_matches_capture(journal, Journal::default());
}

fn test_stream_matches_capture<S>(template: impl Template<S>, state: S) {
	init_logging();

	let mut streamed = String::new();
	stream(&template, &state, &mut streamed).unwrap();

	let render = capture(&template, &state, &SnapshotPool::default()).unwrap();
	assert_eq!(render.snapshot.markup(), streamed);
}

#[test]
fn list_item_keys() {
	init_logging();
	let render = capture(&todos, &Todos::of(&["one", "two"]), &SnapshotPool::default()).unwrap();
	let tree = render.snapshot.tree();

	let (_, list) = tree.find("0").unwrap();
	assert_eq!(list.kind(), KeyholeKind::List);
	let item_keys: Vec<_> = tree.children(list.range().unwrap()).map(|(_, item)| item.key().unwrap().clone()).collect();
	assert_eq!(item_keys, [Key::from("0[one]"), Key::from("0[two]")]);

	match tree.find("0[two].0") {
		Some((_, Keyhole::Scalar { value, .. })) => assert_eq!(value.to_formatted_string(None), "TWO"),
		other => panic!("unexpected {:?}", other),
	}
}

#[test]
fn item_keys_stay_inside_their_markers() {
	init_logging();
	let ids = vec![r#"x"><script>alert(1)</script><b a=""#, "y--><img src=q onerror=alert(2)>", "z&amp;"];
	let buttons = template(|ids: &Vec<&'static str>, c| {
		c.enter_scope(0, 1)?;
		c.append_list(ids, |id| *id, None, |c, id| {
			c.enter_scope(3, 2)?;
			c.append_literal("<button")?;
			c.append_event_binding("click", Handler::new(|_: &mut Vec<&'static str>| Ok(())))?;
			c.append_literal(">")?;
			c.append_scalar(*id, None)?;
			c.append_literal("</button>")
		})
	});
	test_stream_matches_capture(&buttons, ids.clone());

	let render = capture(&buttons, &ids, &SnapshotPool::default()).unwrap();
	let markup = render.snapshot.markup();
	assert!(!markup.contains("<script") && !markup.contains("<img") && !markup.contains("<b "), "{}", markup);
	// Every comment opened is closed exactly once, before the next one opens.
	assert!(markup.split("<!--").skip(1).all(|comment| comment.matches("-->").count() == 1), "{}", markup);

	for id in &ids {
		let binding = Key::root(0).item(id).hole(0);
		assert!(markup.contains(&format!(r#" kh-onclick="{}""#, binding)), "{}", markup);
		assert!(render.handlers.get(binding.as_str()).is_some());
	}
}

#[test]
fn ranges_count_all_nested_keyholes() {
	init_logging();
	let state = Board {
		groups: vec![Group {
			id: "g",
			title: "T".to_owned(),
			entries: items(&["a", "b"]),
		}],
	};
	let render = capture(&board, &state, &SnapshotPool::default()).unwrap();
	let keyholes = render.snapshot.keyholes();

	// list, item, 3 literals + scalar + nested list, 2 × (item + 2 literals + scalar)
	assert_eq!(keyholes.len(), 2 + 5 + 2 * 4);
	assert_eq!(keyholes[0].range().unwrap().length, keyholes.len() - 1);
	assert_eq!(render.snapshot.root_length(), 1);
	assert_eq!(render.snapshot.tree().roots().count(), 1);
}

#[test]
fn pooled_buffers_are_reused() {
	init_logging();
	let pool = SnapshotPool::new(4, usize::MAX);
	let first = capture(&counter, &Counter::default(), &pool).unwrap();
	assert_eq!(pool.idle(), 0);
	drop(first);
	assert_eq!(pool.idle(), 1);

	let second = capture(&counter, &Counter::default(), &pool).unwrap();
	assert_eq!(pool.idle(), 0);
	drop(second);
	assert_eq!(pool.idle(), 1);
	assert!(pool.retained_capacity() >= 5);
}

fn capture_error<F>(template: F) -> ComposeError
where
	F: Fn(&(), &mut Composer<'_, ()>) -> keyhole::ComposeResult,
{
	init_logging();
	capture(&template, &(), &SnapshotPool::default()).unwrap_err()
}

#[test]
fn append_outside_of_scope() {
	assert_eq!(capture_error(template(|_: &(), c| c.append_literal("<p>"))), ComposeError::NoScope { call: "append_literal" });
}

#[test]
fn too_many_holes() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(2, 0)?;
			c.append_literal("<p>")?;
			c.append_scalar(1_i32, None)
		})),
		ComposeError::ScopeOverflow { what: "holes", announced: 0 }
	);
}

#[test]
fn too_many_literals() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(1, 1)?;
			c.append_element(|c| {
				c.enter_scope(1, 0)?;
				c.append_literal("<a>")?;
				c.append_literal("<b>")
			})
		})),
		ComposeError::NoScope { call: "append_literal" }
	);
}

#[test]
fn unterminated_scope() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(2, 1)?;
			c.append_literal("<p>")
		})),
		ComposeError::UnterminatedScope { literals: 1, holes: 1 }
	);
}

#[test]
fn unterminated_nested_scope() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(0, 1)?;
			c.append_element(|c| {
				c.enter_scope(2, 0)?;
				c.append_literal("<p>")
			})
		})),
		ComposeError::UnterminatedScope { literals: 1, holes: 0 }
	);
}

#[test]
fn nested_template_without_scope() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(0, 1)?;
			c.append_element(|_| Ok(()))
		})),
		ComposeError::MissingScope { key: Key::from("0") }
	);
}

#[test]
fn unreserved_scope() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(1, 1)?;
			c.enter_scope(1, 0)
		})),
		ComposeError::UnexpectedScope
	);
}

#[test]
fn appending_after_the_render_completed() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(1, 0)?;
			c.append_literal("<p>")?;
			c.append_literal("</p>")
		})),
		ComposeError::Detached
	);
}

#[test]
fn duplicate_list_keys() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(0, 1)?;
			c.append_list(
				["a", "b", "a"],
				|item| *item,
				None,
				|c, item| {
					c.enter_scope(0, 1)?;
					c.append_scalar(item, None)
				},
			)
		})),
		ComposeError::DuplicateKey {
			list: Key::from("0"),
			item: Key::from("0[a]"),
		}
	);
}

#[test]
fn elements_inside_attributes() {
	assert_eq!(
		capture_error(template(|_: &(), c| {
			c.enter_scope(0, 1)?;
			c.append_attribute("title", |c| {
				c.enter_scope(0, 1)?;
				c.append_element(|c| c.enter_scope(0, 0))
			})
		})),
		ComposeError::AttributeContent {
			key: Key::from("0.0"),
			kind: KeyholeKind::Element,
		}
	);
}

#[test]
fn empty_scopes_close_immediately() {
	init_logging();
	let render = capture(
		&template(|_: &(), c| {
			c.enter_scope(0, 2)?;
			c.append_element(|c| c.enter_scope(0, 0))?;
			c.append_conditional(false, None, |c| c.enter_scope(0, 0))
		}),
		&(),
		&SnapshotPool::default(),
	)
	.unwrap();
	assert_eq!(render.snapshot.markup(), "<!--kh:0--><!--/kh--><!--kh:1--><!--/kh-->");
}

#[test]
fn composers_are_independent() {
	init_logging();
	let pool = SnapshotPool::default();
	let mut first = Composer::<Counter>::capturing(&pool);
	let mut second = Composer::<Counter>::capturing(&pool);
	assert!(first.is_capturing());

	counter(&Counter { clicks: 1 }, &mut first).unwrap();
	counter(&Counter { clicks: 2 }, &mut second).unwrap();
	assert!(first.is_detached() && second.is_detached());

	let first = first.finish().unwrap().unwrap();
	let second = second.finish().unwrap().unwrap();
	assert_ne!(first.snapshot.markup(), second.snapshot.markup());
}
