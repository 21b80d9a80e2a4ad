//! Shared class fixtures, registered into a fresh `HostMirror`.
//!
//! `fx.Shape` is deliberately package-private with private members, so every
//! access to it through the resolver exercises the accessibility override.
//! `fx.Circle` is its public subclass. Member bodies use a `Reflector` over
//! the host they run in, which keeps them honest about re-entrancy.

use argus_mirror::{
    ClassDef, ClassId, ConstructorDef, FieldDef, HostMirror, MethodDef, Mirror, ObjectId, Thrown,
    Value, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, BOOTSTRAP_LOADER,
};
use argus_reflect::Reflector;

pub struct Shapes {
    pub host: HostMirror,
    pub shape: ClassId,
    pub circle: ClassId,
}

pub fn shapes() -> Shapes {
    let host = HostMirror::new();
    let object = host
        .class_by_name("java.lang.Object", BOOTSTRAP_LOADER)
        .unwrap();

    let shape = host
        .register_class(
            ClassDef::new("fx.Shape", BOOTSTRAP_LOADER, 0)
                .extends(object)
                .field(FieldDef::new("id", "I", ACC_PRIVATE))
                .field(FieldDef::new("tag", "Ljava/lang/Object;", ACC_PRIVATE))
                .field(FieldDef::new("created", "I", ACC_PRIVATE | ACC_STATIC))
                .constructor(ConstructorDef::new("(I)V", ACC_PRIVATE, |host, this, args| {
                    let r = Reflector::new(host);
                    r.set_field(this.unwrap(), "id", args[0].clone()).unwrap();
                    bump_created(host);
                    Ok(Value::Void)
                }))
                // Declaration order is load-bearing for the overload tests:
                // pick(Number) before pick(Integer), exact(I) before exact(J),
                // label(Object) before label(Number).
                .method(MethodDef::new(
                    "pick",
                    "(Ljava/lang/Number;)I",
                    ACC_PRIVATE,
                    |_, _, _| Ok(Value::Int(1)),
                ))
                .method(MethodDef::new(
                    "pick",
                    "(Ljava/lang/Integer;)I",
                    ACC_PRIVATE,
                    |_, _, _| Ok(Value::Int(2)),
                ))
                .method(MethodDef::new("exact", "(I)I", ACC_PRIVATE, |_, _, _| {
                    Ok(Value::Int(10))
                }))
                .method(MethodDef::new("exact", "(J)I", ACC_PRIVATE, |_, _, _| {
                    Ok(Value::Int(20))
                }))
                .method(MethodDef::new(
                    "label",
                    "(Ljava/lang/Object;)I",
                    ACC_PRIVATE,
                    |_, _, _| Ok(Value::Int(4)),
                ))
                .method(MethodDef::new(
                    "label",
                    "(Ljava/lang/Number;)I",
                    ACC_PRIVATE,
                    |_, _, _| Ok(Value::Int(5)),
                ))
                .method(MethodDef::new("id", "()I", ACC_PRIVATE, |host, this, _| {
                    Ok(Reflector::new(host)
                        .get_field(this.unwrap(), "id")
                        .unwrap())
                }))
                .method(MethodDef::new(
                    "created",
                    "()I",
                    ACC_PRIVATE | ACC_STATIC,
                    |host, _, _| {
                        let r = Reflector::new(host);
                        let shape = r.resolve_class("fx.Shape", BOOTSTRAP_LOADER).unwrap();
                        Ok(r.get_static_field(shape, "created").unwrap())
                    },
                ))
                .method(MethodDef::new("fail", "()V", ACC_PRIVATE, |_, _, _| {
                    Err(Thrown::new("java.lang.IllegalStateException", "shape said no"))
                })),
        )
        .unwrap();

    let circle = host
        .register_class(
            ClassDef::new("fx.Circle", BOOTSTRAP_LOADER, ACC_PUBLIC)
                .extends(shape)
                .field(FieldDef::new("radius", "D", ACC_PRIVATE))
                // Shadows fx.Shape#tag.
                .field(FieldDef::new("tag", "Ljava/lang/Object;", ACC_PRIVATE))
                .constructor(ConstructorDef::new(
                    "(ID)V",
                    ACC_PUBLIC,
                    |host, this, args| {
                        let r = Reflector::new(host);
                        let this = this.unwrap();
                        r.set_field(this, "id", args[0].clone()).unwrap();
                        r.set_field(this, "radius", args[1].clone()).unwrap();
                        bump_created(host);
                        Ok(Value::Void)
                    },
                ))
                .method(MethodDef::new(
                    "pick",
                    "(Ljava/lang/Long;)I",
                    ACC_PUBLIC,
                    |_, _, _| Ok(Value::Int(3)),
                ))
                .method(MethodDef::new(
                    "scale",
                    "(D)V",
                    ACC_PUBLIC,
                    |host, this, args| {
                        let r = Reflector::new(host);
                        let this = this.unwrap();
                        let radius = r.get_field(this, "radius").unwrap().as_double().unwrap();
                        let factor = args[0].as_double().unwrap();
                        r.set_field(this, "radius", Value::Double(radius * factor))
                            .unwrap();
                        Ok(Value::Void)
                    },
                )),
        )
        .unwrap();

    Shapes { host, shape, circle }
}

pub fn new_circle(fx: &Shapes, id: i32, radius: f64) -> ObjectId {
    Reflector::new(&fx.host)
        .construct(fx.circle, &[Value::Int(id), Value::Double(radius)])
        .unwrap()
}

fn bump_created(host: &HostMirror) {
    let r = Reflector::new(host);
    let shape = r.resolve_class("fx.Shape", BOOTSTRAP_LOADER).unwrap();
    let count = r
        .get_static_field(shape, "created")
        .unwrap()
        .as_int()
        .unwrap();
    r.set_static_field(shape, "created", Value::Int(count + 1))
        .unwrap();
}
