// Generated template module. Do not edit.
use quill_lang::abi;

pub struct Template {
    literals: Vec<abi::Value>,
    f0: abi::Formatter,
}

#[allow(unused_mut, unused_variables, unused_assignments, clippy::all)]
impl Template {
    pub fn new() -> abi::Rc<Self> {
        abi::Rc::new(Self {
            literals: vec![
                abi::Value::from("small"),
                abi::Value::from("big"),
                abi::Value::from(2.0_f64),
                abi::Value::from(";"),
                abi::Value::from("empty"),
                abi::Value::from("Hi %name"),
                abi::Value::from("name"),
                abi::Value::from("anon"),
            ],
            f0: abi::Formatter::build("Hi %name"),
        })
    }
    
    pub fn render(self: &abi::Rc<Self>, runtime: &abi::Runtime, scope: abi::Scope, writer: &mut dyn abi::Writer) -> Result<abi::Value, abi::RuntimeError> {
        let mut call = abi::Call::new(runtime, scope, writer);
        self.call(&mut call)
    }
    
    pub fn call(self: &abi::Rc<Self>, call: &mut abi::Call<'_>) -> Result<abi::Value, abi::RuntimeError> {
        let t = abi::Rc::clone(self);
        let a0 = abi::Activation::root(0);
        let mut b0: Option<abi::Value> = None;
        let v1 = {
            let t = abi::Rc::clone(&t);
            let captured = call.scope.clone();
            let parent = abi::Rc::clone(&a0);
            abi::define_partial(move |call, args| {
                let a1 = abi::Activation::for_call(&parent, 1, args, abi::Value::Nil);
                let scope = captured.clone();
                abi::with_scope(call, scope, |call| {
                    a1.set(0, 0, args.get(0).cloned().unwrap_or_default());
                    let mut b2: Option<abi::Value> = None;
                    let v3 = a1.get(0, 0);
                    let v4 = t.literals[2].clone();
                    let v5 = abi::binary(abi::BinaryOp::Gt, &v3, &v4);
                    if abi::truthy(&v5) {
                        let v6 = t.literals[1].clone();
                        b2 = Some(v6);
                    } else {
                        let v7 = t.literals[0].clone();
                        b2 = Some(v7);
                    }
                    Ok(b2.unwrap_or_default())
                })
            })
        };
        call.scope.set("size", v1);
        {
            let a1 = abi::Activation::new(&a0, 2);
            let scope = call.scope.clone();
            abi::with_scope(call, scope, |call| {
                let mut ran = false;
                let v8 = call.scope.get("items");
                for (k9, v10) in abi::iterate(&v8) {
                    a1.set(0, 0, v10);
                    a1.set(0, 1, k9);
                    ran = true;
                    let mut b11: Option<abi::Value> = None;
                    let v12 = a1.get(0, 1);
                    abi::output(call, &v12)?;
                    let v13 = call.scope.get("size");
                    let v14 = a1.get(0, 0);
                    let v15 = abi::exec(call, &v13, &[v14])?;
                    abi::output(call, &v15)?;
                    call.writer.raw(";");
                }
                if !ran {
                    let mut b16: Option<abi::Value> = None;
                    call.writer.raw("empty");
                }
                Ok(())
            })?;
        }
        let v17 = call.scope.get("user");
        let a1 = abi::Activation::new(&a0, 0);
        let scope = call.scope.extend_from(&[v17]);
        let v18 = abi::with_scope(call, scope, |call| {
            let mut b19: Option<abi::Value> = None;
            let v20 = t.literals[6].clone();
            let v21 = call.scope.get("name");
            let v22 = abi::dict(vec![(v20, v21)]);
            let v23 = t.f0.format(call, &v22)?;
            abi::output(call, &v23)?;
            Ok(b19)
        })?;
        if v18.is_some() {
            b0 = v18;
        }
        let v24 = call.scope.get("user");
        let v25 = t.literals[6].clone();
        let v26 = abi::member(&v24, &v25);
        let v27 = if abi::truthy(&v26) {
            v26
        } else {
            let v28 = t.literals[7].clone();
            v28
        };
        abi::output(call, &v27)?;
        Ok(b0.unwrap_or_default())
    }
}
