use super::*;
use crate::checked::{CheckedClass, CheckedExpr, CheckedExprKind, Dispatch, MethodEntry};
use crate::errors::{SemanticError, SemanticWarning};
use crate::project::ProjectInput;
use crate::resolver::Resolver;
use crate::{Analysis, analyze};
use cinder_frontend::{AstBuilder, BinaryOp, Decl};

fn check(b: AstBuilder, declarations: Vec<Decl>) -> (Analysis, Interner) {
    let file = b.file("", vec![], declarations);
    let mut interner = b.into_interner();
    let analysis = analyze(&ProjectInput::new("app"), vec![file], &mut interner);
    (analysis, interner)
}

fn errors(analysis: &Analysis) -> Vec<&SemanticError> {
    analysis.errors.iter().map(|e| &e.error).collect()
}

fn class_named<'a>(analysis: &'a Analysis, name: &str) -> &'a CheckedClass {
    analysis
        .program
        .classes
        .iter()
        .find(|c| c.display_name == name)
        .unwrap_or_else(|| panic!("no class {name}"))
}

fn method(class: &CheckedClass, interner: &Interner, name: &str) -> FuncInstId {
    match class.methods.get(&interner.lookup(name).unwrap()) {
        Some(MethodEntry::Instance(f)) => *f,
        other => panic!("no instance method {name}: {other:?}"),
    }
}

fn tail<'a>(analysis: &'a Analysis, function: &str) -> &'a CheckedExpr {
    let id = analysis.program.function_named(function).unwrap();
    let body = analysis.program.function(id).body.as_ref().unwrap();
    body.tail.as_deref().unwrap()
}

fn animal_and_duck(b: &AstBuilder) -> Vec<Decl> {
    let animal = b
        .class("Animal")
        .with_field(b.field_decl("legs", b.i64_ty(), None))
        .with_method(b.func("speak", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(42)))).with_virtual());
    let duck = b
        .class("Duck")
        .extends(b.named("Animal"))
        .with_field(b.field_decl("wings", b.i64_ty(), None))
        .with_method(b.func("speak", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(7)))).with_override());
    vec![Decl::Class(animal), Decl::Class(duck)]
}

#[test]
fn inheritance_ids_are_unique_within_chain() {
    let b = AstBuilder::new();
    let mut decls = animal_and_duck(&b);
    decls.push(Decl::Class(b.class("Goose").extends(b.named("Animal"))));
    decls.push(Decl::Class(b.class("Rock")));
    let (analysis, _) = check(b, decls);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    assert_eq!(class_named(&analysis, "Animal").id, 0);
    assert_eq!(class_named(&analysis, "Duck").id, 1);
    assert_eq!(class_named(&analysis, "Goose").id, 2);
    // Unrelated root starts its own chain
    assert_eq!(class_named(&analysis, "Rock").id, 0);
}

#[test]
fn inherited_fields_come_first() {
    let b = AstBuilder::new();
    let decls = animal_and_duck(&b);
    let (analysis, interner) = check(b, decls);
    let animal = class_named(&analysis, "Animal");
    let duck = class_named(&analysis, "Duck");

    assert_eq!(duck.fields.len(), 2);
    assert_eq!(duck.fields[0].name, animal.fields[0].name);
    assert_eq!(duck.fields[0].index, 0);
    assert_eq!(duck.fields[1].name, interner.lookup("wings").unwrap());
    assert_eq!(duck.fields[1].index, 1);
}

#[test]
fn overrides_are_registered_on_the_slot_owner() {
    let b = AstBuilder::new();
    let decls = animal_and_duck(&b);
    let (analysis, interner) = check(b, decls);
    let program = &analysis.program;
    let animal = class_named(&analysis, "Animal");
    let duck = class_named(&analysis, "Duck");
    let base = method(animal, &interner, "speak");
    let over = method(duck, &interner, "speak");

    let base_fn = program.function(base);
    assert!(base_fn.is_virtual);
    assert_eq!(base_fn.vtable_slot, Some(0));
    assert_eq!(base_fn.overrides.get(&0), Some(&base));
    assert_eq!(base_fn.overrides.get(&1), Some(&over));
    assert!(program.function(over).is_override);
    assert_eq!(program.function(over).vtable_slot, Some(0));

    assert_eq!(animal.vtable, vec![base]);
    assert_eq!(duck.vtable, vec![over]);
}

#[test]
fn calls_through_base_references_dispatch_virtually() {
    let b = AstBuilder::new();
    let mut decls = animal_and_duck(&b);
    let through_base = b.func(
        "through_base",
        vec![],
        Some(b.i64_ty()),
        b.block(
            vec![b.let_stmt("a", Some(b.named("Animal")), Some(b.new_object(b.named("Duck"), vec![])))],
            Some(b.method_call(b.ident("a"), "speak", vec![])),
        ),
    );
    let direct = b.func(
        "direct",
        vec![],
        Some(b.i64_ty()),
        b.block(vec![], Some(b.method_call(b.new_object(b.named("Duck"), vec![]), "speak", vec![]))),
    );
    decls.push(Decl::Function(through_base));
    decls.push(Decl::Function(direct));
    let (analysis, interner) = check(b, decls);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let CheckedExprKind::Call { dispatch, .. } = &tail(&analysis, "through_base").kind else {
        panic!("expected a call");
    };
    assert_eq!(*dispatch, Dispatch::Virtual { slot: 0 });

    let duck_speak = method(class_named(&analysis, "Duck"), &interner, "speak");
    let CheckedExprKind::Call { function, dispatch, .. } = &tail(&analysis, "direct").kind else {
        panic!("expected a call");
    };
    assert_eq!(*dispatch, Dispatch::Static);
    assert_eq!(*function, duck_speak);
}

#[test]
fn specialization_is_idempotent() {
    let b = AstBuilder::new();
    let class = b
        .class("Box")
        .with_type_params(vec![b.type_param("T")])
        .with_field(b.field_decl("value", b.named("T"), None))
        .with_method(b.func("get", vec![], Some(b.named("T")), b.block(vec![], Some(b.ident("value")))));
    let file = b.file("", vec![], vec![Decl::Class(class)]);
    let mut interner = b.into_interner();
    let project = ProjectInput::new("app");
    let mut tree = ScopeTree::new(&project, &mut interner);
    let mut errors = Vec::new();
    tree.register_file(file, &mut errors, &interner);
    let (resolved, _) = Resolver::resolve(&tree, &interner);
    let box_id = tree.structure_in(tree.root(), interner.lookup("Box").unwrap()).unwrap();

    let mut checker = Checker::new(&mut tree, &resolved, &interner);
    let first = checker.check_class(box_id, &[Type::I32]).unwrap();
    let other = checker.check_class(box_id, &[Type::I64]).unwrap();
    let again = checker.check_class(box_id, &[Type::I32]).unwrap();
    assert_eq!(first, again);
    assert_ne!(first, other);
    assert!(checker.errors().is_empty());

    let program = checker.program();
    assert_eq!(program.class(first).display_name, "Box<i32>");
    assert_eq!(program.class(first).fields[0].ty, Type::I32);
    assert_eq!(program.class(other).fields[0].ty, Type::I64);
    assert_eq!(program.cache.class_instances(box_id).len(), 2);

    let get = interner.lookup("get").unwrap();
    let Some(MethodEntry::Instance(get_i32)) = program.class(first).methods.get(&get).copied() else {
        panic!("get not instantiated");
    };
    assert_eq!(program.function(get_i32).return_type, Type::I32);
    assert!(program.function(get_i32).body.is_some());

    assert_eq!(checker.check_class(box_id, &[]), None);
    assert!(matches!(
        checker.errors()[0].error,
        SemanticError::WrongNumberOfTypeArguments { expected: 1, found: 0, .. }
    ));
}

#[test]
fn self_referential_generic_sees_placeholder() {
    let b = AstBuilder::new();
    let node = b
        .class("Node")
        .with_type_params(vec![b.type_param("T")])
        .with_field(b.field_decl("value", b.named("T"), None))
        .with_field(b.field_decl("next", b.generic("Node", vec![b.named("T")]), None));
    let user = b.func(
        "head",
        vec![b.param("n", b.generic("Node", vec![b.i64_ty()]))],
        Some(b.i64_ty()),
        b.block(vec![], Some(b.field(b.ident("n"), "value"))),
    );
    let (analysis, _) = check(b, vec![Decl::Class(node), Decl::Function(user)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let (index, node) = analysis
        .program
        .classes
        .iter()
        .enumerate()
        .find(|(_, c)| c.display_name == "Node<i64>")
        .unwrap();
    assert_eq!(node.fields[1].ty, Type::Class(ClassInstId::new(index as u32)));
    assert!(!node.in_progress);
}

#[test]
fn infinitely_expanding_generic_is_reported() {
    let b = AstBuilder::new();
    let deep = b
        .class("Deep")
        .with_type_params(vec![b.type_param("T")])
        .with_field(b.field_decl(
            "inner",
            b.generic("Deep", vec![b.generic("Deep", vec![b.named("T")])]),
            None,
        ));
    let user = b.func(
        "f",
        vec![b.param("d", b.generic("Deep", vec![b.i32_ty()]))],
        None,
        b.block(vec![], None),
    );
    let (analysis, _) = check(b, vec![Decl::Class(deep), Decl::Function(user)]);
    assert!(
        errors(&analysis)
            .iter()
            .any(|e| matches!(e, SemanticError::InstantiationTooDeep { limit: 64, .. }))
    );
}

#[test]
fn override_rules_are_reported_independently() {
    let b = AstBuilder::new();
    let base = b
        .class("Base")
        .with_method(b.func("run", vec![], None, b.block(vec![], None)))
        .with_method(b.func("speak", vec![], None, b.block(vec![], None)).with_virtual());
    let derived = b
        .class("Derived")
        .extends(b.named("Base"))
        .with_method(b.func("run", vec![], None, b.block(vec![], None)))
        .with_method(b.func("speak", vec![], None, b.block(vec![], None)))
        .with_method(b.func("fly", vec![], None, b.block(vec![], None)).with_override());
    let free_virtual = b.func("helper", vec![], None, b.block(vec![], None)).with_virtual();
    let free_override = b.func("other", vec![], None, b.block(vec![], None)).with_override();
    let (analysis, _) = check(
        b,
        vec![
            Decl::Class(base),
            Decl::Class(derived),
            Decl::Function(free_virtual),
            Decl::Function(free_override),
        ],
    );
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 5, "{errors:?}");
    assert!(errors.iter().any(|e| matches!(e, SemanticError::CannotOverrideNonVirtual { .. })));
    assert!(errors.iter().any(|e| matches!(e, SemanticError::ExpectedOverride { .. })));
    assert!(errors.iter().any(|e| matches!(e, SemanticError::NoMethodToOverride { .. })));
    assert!(errors.iter().any(|e| matches!(e, SemanticError::MisplacedVirtual { .. })));
    assert!(errors.iter().any(|e| matches!(e, SemanticError::MisplacedOverride { .. })));
}

#[test]
fn ancestor_must_be_a_class_and_acyclic() {
    let b = AstBuilder::new();
    let protocol = b.protocol("Speaker", vec![]);
    let bad = b.class("Bad").extends(b.named("Speaker"));
    let looped = b.class("Loop").extends(b.named("Loop"));
    let (analysis, _) = check(
        b,
        vec![Decl::Protocol(protocol), Decl::Class(bad), Decl::Class(looped)],
    );
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.iter().all(|e| matches!(e, SemanticError::UnableToInherit { .. })));
}

#[test]
fn base_class_may_name_its_subclass() {
    // class Shape { next: Circle  virtual func area() -> i64 { 1 }  func twin(other: Circle) -> i64 { 1 } }
    // class Circle : Shape { override func area() -> i64 { 3 } }
    let b = AstBuilder::new();
    let shape = b
        .class("Shape")
        .with_field(b.field_decl("next", b.named("Circle"), None))
        .with_method(b.func("area", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(1)))).with_virtual())
        .with_method(b.func(
            "twin",
            vec![b.param("other", b.named("Circle"))],
            Some(b.i64_ty()),
            b.block(vec![], Some(b.int(1))),
        ));
    let circle = b
        .class("Circle")
        .extends(b.named("Shape"))
        .with_method(b.func("area", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(3)))).with_override());
    let (analysis, interner) = check(b, vec![Decl::Class(shape), Decl::Class(circle)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let shape = class_named(&analysis, "Shape");
    let circle = class_named(&analysis, "Circle");
    let ancestor = circle.ancestor.map(|a| analysis.program.class(a).display_name.as_str());
    assert_eq!(ancestor, Some("Shape"));
    assert_eq!((shape.id, circle.id), (0, 1));
    assert_eq!(circle.root, shape.root);
    assert_eq!(circle.fields.len(), shape.fields.len());
    assert!(!circle.in_progress);
    assert_eq!(circle.vtable, vec![method(circle, &interner, "area")]);
    assert_eq!(shape.vtable, vec![method(shape, &interner, "area")]);
}

#[test]
fn mutual_inheritance_is_a_cycle() {
    let b = AstBuilder::new();
    let first = b.class("First").extends(b.named("Second"));
    let second = b.class("Second").extends(b.named("First"));
    let (analysis, _) = check(b, vec![Decl::Class(first), Decl::Class(second)]);
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(
        errors[0],
        SemanticError::UnableToInherit { reason, .. } if reason == "inheritance cycle"
    ));
    assert!(analysis.program.classes.iter().all(|c| !c.in_progress));
}

#[test]
fn self_outside_methods_is_misplaced() {
    let b = AstBuilder::new();
    let free = b.func("f", vec![], None, b.block(vec![b.expr_stmt(b.self_ref())], None));
    let class = b
        .class("C")
        .with_field(b.field_decl("x", b.i64_ty(), Some(b.self_ref())));
    let (analysis, _) = check(b, vec![Decl::Function(free), Decl::Class(class)]);
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.iter().all(|e| matches!(e, SemanticError::MisplacedSelf { .. })));
}

#[test]
fn call_arity_and_type_arguments() {
    let b = AstBuilder::new();
    let add = b.func(
        "add",
        vec![b.param("a", b.i64_ty()), b.param("c", b.i64_ty())],
        Some(b.i64_ty()),
        b.block(vec![], Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("c")))),
    );
    let id = b
        .func("id", vec![b.param("x", b.named("T"))], Some(b.named("T")), b.block(vec![], Some(b.ident("x"))))
        .with_type_params(vec![b.type_param("T")]);
    let make = b
        .func("make", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(0))))
        .with_type_params(vec![b.type_param("T")]);
    let main = b.func(
        "main",
        vec![],
        None,
        b.block(
            vec![
                b.expr_stmt(b.call("add", vec![b.int(1)])),
                b.expr_stmt(b.call_generic("id", vec![b.i64_ty(), b.i64_ty()], vec![b.int(1)])),
                b.expr_stmt(b.call("make", vec![])),
                b.expr_stmt(b.call("missing", vec![])),
            ],
            None,
        ),
    );
    let (analysis, _) = check(
        b,
        vec![Decl::Function(add), Decl::Function(id), Decl::Function(make), Decl::Function(main)],
    );
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 4, "{errors:?}");
    assert!(matches!(errors[0], SemanticError::WrongNumberOfArguments { expected: 2, found: 1, .. }));
    assert!(matches!(errors[1], SemanticError::WrongNumberOfTypeArguments { expected: 1, found: 2, .. }));
    assert!(matches!(errors[2], SemanticError::UnableToInferType { .. }));
    assert!(matches!(errors[3], SemanticError::SymbolDoesNotExist { .. }));
}

#[test]
fn generic_arguments_are_inferred_per_call() {
    let b = AstBuilder::new();
    let id = b
        .func("id", vec![b.param("x", b.named("T"))], Some(b.named("T")), b.block(vec![], Some(b.ident("x"))))
        .with_type_params(vec![b.type_param("T")]);
    let main = b.func(
        "main",
        vec![],
        Some(b.i64_ty()),
        b.block(
            vec![b.let_stmt("s", None, Some(b.call("id", vec![b.string("hi")])))],
            Some(b.call("id", vec![b.int(5)])),
        ),
    );
    let (analysis, interner) = check(b, vec![Decl::Function(id), Decl::Function(main)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let id_sym = interner.lookup("id").unwrap();
    let mut instances: Vec<Vec<Type>> = analysis
        .program
        .functions
        .iter()
        .filter(|f| f.name == id_sym)
        .map(|f| f.type_args.clone())
        .collect();
    instances.sort_by_key(|args| args[0] == Type::STRING);
    assert_eq!(instances, vec![vec![Type::I64], vec![Type::STRING]]);
    assert_eq!(tail(&analysis, "main").ty, Type::I64);
}

#[test]
fn type_mismatches_are_reported() {
    let b = AstBuilder::new();
    let bad_let = b.func(
        "bad_let",
        vec![],
        None,
        b.block(vec![b.let_stmt("x", Some(b.bool_ty()), Some(b.int(42)))], None),
    );
    let no_return = b.func("no_return", vec![], Some(b.i64_ty()), b.block(vec![], None));
    let bad_condition = b.func(
        "bad_condition",
        vec![],
        None,
        b.block(vec![b.while_loop(b.int(1), b.block(vec![], None))], None),
    );
    let bad_operands = b.func(
        "bad_operands",
        vec![],
        None,
        b.block(vec![b.expr_stmt(b.binary(BinaryOp::Add, b.string("a"), b.bool_lit(true)))], None),
    );
    let (analysis, _) = check(
        b,
        vec![
            Decl::Function(bad_let),
            Decl::Function(no_return),
            Decl::Function(bad_condition),
            Decl::Function(bad_operands),
        ],
    );
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 4, "{errors:?}");
    assert!(errors.iter().all(|e| matches!(e, SemanticError::UnexpectedType { .. })));
}

#[test]
fn integer_literals_take_the_expected_numeric_type() {
    // fn half() -> f64 { let x: f64 = 1; x / 2.0 }
    let b = AstBuilder::new();
    let half = b.func(
        "half",
        vec![],
        Some(b.f64_ty()),
        b.block(
            vec![b.let_stmt("x", Some(b.f64_ty()), Some(b.int(1)))],
            Some(b.binary(BinaryOp::Div, b.ident("x"), b.float(2.0))),
        ),
    );
    let (analysis, _) = check(b, vec![Decl::Function(half)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let id = analysis.program.function_named("half").unwrap();
    let body = analysis.program.function(id).body.as_ref().unwrap();
    let crate::checked::CheckedStmt::Let { init: Some(init), .. } = &body.stmts[0] else {
        panic!("expected a let: {:?}", body.stmts[0]);
    };
    assert_eq!(init.ty, Type::F64);
    assert!(matches!(init.kind, CheckedExprKind::IntLiteral(1)));
}

#[test]
fn unreachable_code_and_shadowing_are_warnings() {
    let b = AstBuilder::new();
    let f = b.func(
        "f",
        vec![b.param("x", b.i64_ty())],
        Some(b.i64_ty()),
        b.block(
            vec![
                b.expr_stmt(b.block_expr(b.block(vec![b.let_stmt("x", None, Some(b.int(2)))], None))),
                b.ret(Some(b.ident("x"))),
                b.expr_stmt(b.int(3)),
            ],
            None,
        ),
    );
    let (analysis, _) = check(b, vec![Decl::Function(f)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    let warnings: Vec<_> = analysis.warnings.iter().map(|w| &w.warning).collect();
    assert_eq!(warnings.len(), 2);
    assert!(matches!(warnings[0], SemanticWarning::ShadowedBinding { .. }));
    assert!(matches!(warnings[1], SemanticWarning::UnreachableCode { .. }));
    assert!(!analysis.has_errors());
}

#[test]
fn protocol_conformance_and_assignability() {
    let b = AstBuilder::new();
    let speaker = b.protocol("Speaker", vec![b.signature("speak", vec![], Some(b.i64_ty()))]);
    let duck = b
        .class("Duck")
        .implements(b.named("Speaker"))
        .with_method(b.func("speak", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(7)))));
    let rock = b.class("Rock").implements(b.named("Speaker"));
    let user = b.func(
        "user",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("s", Some(b.named("Speaker")), Some(b.new_object(b.named("Duck"), vec![]))),
                b.let_stmt("r", Some(b.named("Speaker")), Some(b.new_object(b.named("Rock"), vec![]))),
                b.expr_stmt(b.method_call(b.ident("s"), "speak", vec![])),
            ],
            None,
        ),
    );
    let (analysis, interner) = check(
        b,
        vec![Decl::Protocol(speaker), Decl::Class(duck), Decl::Class(rock), Decl::Function(user)],
    );
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(matches!(errors[0], SemanticError::ProtocolNotSatisfied { .. }));
    // Rock is not an implementor; protocol receivers cannot be called
    assert!(matches!(errors[1], SemanticError::UnexpectedType { .. }));
    assert!(matches!(errors[2], SemanticError::UnexpectedType { .. }));

    let speaker = analysis
        .tree
        .structure_in(analysis.tree.root(), interner.lookup("Speaker").unwrap())
        .unwrap();
    let duck = class_named(&analysis, "Duck");
    assert_eq!(analysis.tree.structure(speaker).implementors, vec![duck.structure]);
    assert_eq!(duck.protocols, vec![speaker]);
}

#[test]
fn extension_functions_bind_self() {
    let b = AstBuilder::new();
    let double = b
        .func(
            "double",
            vec![],
            Some(b.i64_ty()),
            b.block(vec![], Some(b.binary(BinaryOp::Mul, b.self_ref(), b.int(2)))),
        )
        .with_receiver(b.i64_ty());
    let main = b.func(
        "main",
        vec![],
        Some(b.i64_ty()),
        b.block(vec![], Some(b.method_call(b.int(21), "double", vec![]))),
    );
    let (analysis, _) = check(b, vec![Decl::Function(double), Decl::Function(main)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let CheckedExprKind::Call { function, receiver, .. } = &tail(&analysis, "main").kind else {
        panic!("expected a call");
    };
    let callee = analysis.program.function(*function);
    assert_eq!(callee.kind, FunctionKind::Extension);
    assert_eq!(callee.receiver, Some(Type::I64));
    assert!(receiver.is_some());
}

#[test]
fn enums_support_equality_only() {
    let b = AstBuilder::new();
    let color = b.enum_decl("Color", &["Red", "Green"]);
    let same = b.func(
        "same",
        vec![],
        Some(b.bool_ty()),
        b.block(
            vec![
                b.expr_stmt(b.binary(
                    BinaryOp::Lt,
                    b.enum_variant(b.named("Color"), "Red"),
                    b.enum_variant(b.named("Color"), "Green"),
                )),
                b.expr_stmt(b.enum_variant(b.named("Color"), "Blue")),
            ],
            Some(b.binary(
                BinaryOp::Eq,
                b.enum_variant(b.named("Color"), "Red"),
                b.enum_variant(b.named("Color"), "Green"),
            )),
        ),
    );
    let (analysis, _) = check(b, vec![Decl::Enum(color), Decl::Function(same)]);
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(matches!(errors[0], SemanticError::UnexpectedType { .. }));
    assert!(matches!(errors[1], SemanticError::SymbolDoesNotExist { .. }));
    let CheckedExprKind::Binary { right, .. } = &tail(&analysis, "same").kind else {
        panic!("expected a comparison");
    };
    assert!(matches!(right.kind, CheckedExprKind::EnumVariant { discriminant: 1, .. }));
}

#[test]
fn field_defaults_run_in_the_initializer() {
    let b = AstBuilder::new();
    let counter = b
        .class("Counter")
        .with_field(b.field_decl("count", b.i64_ty(), Some(b.int(10))))
        .with_field(b.field_decl("step", b.i32_ty(), None));
    let (analysis, _) = check(b, vec![Decl::Class(counter)]);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

    let counter = class_named(&analysis, "Counter");
    let init = analysis.program.function(counter.init.unwrap());
    assert_eq!(init.kind, FunctionKind::Init);
    assert!(init.symbol.is_none());
    assert_eq!(init.field_inits.len(), 1);
    assert_eq!(init.field_inits[0].index, 0);
    assert_eq!(init.field_inits[0].value.ty, Type::I64);
}

#[test]
fn only_locals_and_fields_are_assignable() {
    let b = AstBuilder::new();
    let one = b.func("one", vec![], Some(b.i64_ty()), b.block(vec![], Some(b.int(1))));
    let f = b.func(
        "f",
        vec![],
        None,
        b.block(
            vec![
                b.let_stmt("x", None, Some(b.int(1))),
                b.assign(b.ident("x"), b.int(2)),
                b.assign(b.call("one", vec![]), b.int(3)),
                b.let_stmt("y", None, None),
            ],
            None,
        ),
    );
    let (analysis, _) = check(b, vec![Decl::Function(one), Decl::Function(f)]);
    let errors = errors(&analysis);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(matches!(errors[0], SemanticError::NotAssignable { .. }));
    assert!(matches!(errors[1], SemanticError::UnableToInferType { .. }));
}

#[test]
fn duplicate_diagnostics_keep_the_first() {
    let mut items = vec![(1, "a"), (2, "b"), (1, "a"), (3, "a"), (2, "b"), (1, "c")];
    dedup_by_span(&mut items, |&(span, message)| (span, message.to_string()));
    assert_eq!(items, vec![(1, "a"), (2, "b"), (3, "a"), (1, "c")]);
}
